use crate::models::{NORMALIZED_EXTENT, NormalizedBox, PixelBox, PlacedItem, RawItem};

use super::TileItems;
use super::parser::RawItems;
use super::tiles::TileRect;

/// Image-wide parameters shared by every box of one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reprojection {
    /// Nominal tile side; model coordinates are scaled by this, not by the truncated edge width
    pub tile_size: u32,
    pub image_width: u32,
    pub image_height: u32,
}

/// `(c / 1000) * tile_size + offset`, clamped to `[0, limit]`
pub fn reproject_coordinate(normalized: f64, tile_size: u32, offset: u32, limit: u32) -> f64 {
    let pixel = (normalized / NORMALIZED_EXTENT) * tile_size as f64 + offset as f64;
    pixel.clamp(0.0, limit as f64)
}

/// Map a tile-local normalized box into panorama pixels. Each coordinate is clamped
/// independently, so out-of-range input yields a degenerate box rather than an error.
pub fn reproject(
    normalized: &NormalizedBox,
    tile_offset: (u32, u32),
    tile_size: u32,
    image_width: u32,
    image_height: u32,
) -> PixelBox {
    let (offset_x, offset_y) = tile_offset;
    PixelBox {
        x1: reproject_coordinate(normalized.x1, tile_size, offset_x, image_width),
        x2: reproject_coordinate(normalized.x2, tile_size, offset_x, image_width),
        y1: reproject_coordinate(normalized.y1, tile_size, offset_y, image_height),
        y2: reproject_coordinate(normalized.y2, tile_size, offset_y, image_height),
    }
}

impl Reprojection {
    pub fn place_item(&self, rect: &TileRect, item: RawItem) -> PlacedItem {
        let bounding_boxes = item
            .bounding_boxes
            .iter()
            .map(|b| {
                reproject(
                    b,
                    rect.offset(),
                    self.tile_size,
                    self.image_width,
                    self.image_height,
                )
            })
            .collect();

        PlacedItem {
            quantity: item.quantity,
            cost_per_item: item.cost_per_item,
            bounding_boxes,
        }
    }

    /// Reproject every item of a tile, keeping their order
    pub fn place_tile(&self, rect: &TileRect, items: RawItems) -> TileItems {
        items
            .into_iter()
            .map(|(name, item)| (name, self.place_item(rect, item)))
            .collect()
    }
}
