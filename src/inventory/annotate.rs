use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::config::GenerationConfig;
use crate::error::CapabilityError;

use super::tiles::{Tile, TileRect};

/// Instruction sent with every tile
pub const INVENTORY_INSTRUCTIONS: &str = r#"You will be finding a maximum of 20 different items/objects/furniture in this image (except wall structure and people), including their estimated monetary value and pixel bounding box in the image. For each item found, you must ensure the following:
1. **If there are multiple of the same item**, list them under a single key with an appropriate quantity and bounding boxes.
2. **Do not duplicate item names.** Use only one key per item type.
3. Each item's value and bounding boxes must be represented as strings.
4. The output format must **strictly follow JSON formatting rules**, with keys as strings, like the following example:
```json
{"item_name":{"quantity":"", "cost_per_item":"", "bounding_boxes":[{"x1":,"x2":,"y1":,"y2":},...]}}
```
5. **Important**: The JSON should be a single object containing each item as a key. Ensure there are no duplicate keys. Do not output anything other than the JSON object itself.
Start the JSON output here:"#;

/// Everything the recognition capability receives for one tile
#[derive(Debug, Clone)]
pub struct AnnotationRequest {
    pub tile: TileRect,
    pub mime_type: &'static str,
    pub image_bytes: Vec<u8>,
    pub instructions: &'static str,
    pub generation: GenerationConfig,
}

impl AnnotationRequest {
    pub fn for_tile(tile: &Tile, generation: GenerationConfig) -> Result<Self, image::ImageError> {
        Ok(Self {
            tile: tile.rect,
            mime_type: "image/jpeg",
            image_bytes: encode_jpeg(&tile.image)?,
            instructions: INVENTORY_INSTRUCTIONS,
            generation,
        })
    }
}

pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut buffer, image::ImageFormat::Jpeg)?;
    Ok(buffer.into_inner())
}

/// Item-recognition capability. Returns the model's raw text; parsing happens downstream.
pub trait AnnotationClient: Send + Sync {
    fn annotate(&self, request: &AnnotationRequest) -> Result<String, CapabilityError>;
}

/// Serves responses recorded on disk as `tile_{row:03}_{col:03}.txt`
#[derive(Debug, Clone)]
pub struct ReplayAnnotationClient {
    dir: PathBuf,
}

impl ReplayAnnotationClient {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn response_file_name(tile: &TileRect) -> String {
        format!("tile_{:03}_{:03}.txt", tile.row, tile.col)
    }

    pub fn response_path(&self, tile: &TileRect) -> PathBuf {
        self.dir.join(Self::response_file_name(tile))
    }
}

impl AnnotationClient for ReplayAnnotationClient {
    fn annotate(&self, request: &AnnotationRequest) -> Result<String, CapabilityError> {
        Ok(std::fs::read_to_string(self.response_path(&request.tile))?)
    }
}
