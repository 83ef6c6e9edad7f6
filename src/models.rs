use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use uuid::Uuid;

/// Side of the square coordinate space annotation boxes are expressed in
pub const NORMALIZED_EXTENT: f64 = 1000.0;

/// Tile-local box in the fixed [0, 1000] space used by the recognition model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Box in panorama pixel space, every coordinate within [0, dimension]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelBox {
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
}

impl PixelBox {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Zero-area or inverted boxes survive clamping but cover nothing
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

/// One entry of a parsed annotation, before reprojection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub quantity: Option<String>,
    pub cost_per_item: Option<String>,
    pub bounding_boxes: Vec<NormalizedBox>,
}

/// One entry of a tile's result after reprojection into panorama space
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacedItem {
    pub quantity: Option<String>,
    pub cost_per_item: Option<String>,
    pub bounding_boxes: Vec<PixelBox>,
}

fn empty_if_none<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

/// Inventory entry keyed by exact (case-sensitive) item name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalItem {
    #[serde(skip)]
    pub name: String,
    #[serde(serialize_with = "empty_if_none")]
    pub quantity: Option<String>,
    #[serde(serialize_with = "empty_if_none")]
    pub cost_per_item: Option<String>,
    pub bounding_boxes: Vec<PixelBox>,
}

/// Deduplicated result of the tiling pipeline, kept in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    items: Vec<GlobalItem>,
    index: HashMap<String, usize>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&GlobalItem> {
        self.index.get(name).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut GlobalItem> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.items[i]),
            None => None,
        }
    }

    /// Insert a new entry; returns false and leaves the inventory untouched if the name exists
    pub fn insert(&mut self, item: GlobalItem) -> bool {
        if self.index.contains_key(&item.name) {
            return false;
        }
        self.index.insert(item.name.clone(), self.items.len());
        self.items.push(item);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlobalItem> {
        self.items.iter()
    }

    pub fn total_boxes(&self) -> usize {
        self.items.iter().map(|item| item.bounding_boxes.len()).sum()
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for Inventory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for item in &self.items {
            map.serialize_entry(&item.name, item)?;
        }
        map.end()
    }
}

/// Candidate object from the detector, in source pixel space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u32>,
}

impl DetectionBox {
    pub fn area(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0) * (self.y_max - self.y_min).max(0.0)
    }

    pub fn intersection_area(&self, other: &DetectionBox) -> f32 {
        let x1 = self.x_min.max(other.x_min);
        let y1 = self.y_min.max(other.y_min);
        let x2 = self.x_max.min(other.x_max);
        let y2 = self.y_max.min(other.y_max);

        if x2 > x1 && y2 > y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0.0
        }
    }

    pub fn iou(&self, other: &DetectionBox) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

/// Inclusive min/max coordinates of a mask's set pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl MaskBounds {
    /// Distance between the outermost set columns
    pub fn extent_width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn extent_height(&self) -> u32 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (u32, u32) {
        ((self.min_x + self.max_x) / 2, (self.min_y + self.max_y) / 2)
    }
}

/// Per-pixel object membership aligned to the source image grid; non-zero means set
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pixels: GrayImage,
}

impl Mask {
    pub fn new(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let pixels = GrayImage::from_fn(width, height, |x, y| {
            if f(x, y) { Luma([255u8]) } else { Luma([0u8]) }
        });
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.pixels.get_pixel(x, y)[0] > 0
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn tight_bounds(&self) -> Option<MaskBounds> {
        let mut bounds: Option<MaskBounds> = None;

        for (x, y, pixel) in self.pixels.enumerate_pixels() {
            if pixel[0] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => MaskBounds { min_x: x, min_y: y, max_x: x, max_y: y },
                Some(b) => MaskBounds {
                    min_x: b.min_x.min(x),
                    min_y: b.min_y.min(y),
                    max_x: b.max_x.max(x),
                    max_y: b.max_y.max(y),
                },
            });
        }

        bounds
    }
}

/// Crop rectangle in source pixels, half-open: [x_min, x_max) x [y_min, y_max)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl CropBox {
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }

    pub fn is_square(&self) -> bool {
        self.width() == self.height()
    }
}

/// One extracted object, ready for embedding or classification
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: Uuid,
    /// Position of the originating mask in the segmenter output
    pub source_index: usize,
    pub image: DynamicImage,
    pub bbox: CropBox,
    pub transparent: Option<RgbaImage>,
    /// Mask restricted to the crop, same size as `image`
    pub mask: GrayImage,
    /// The ideal square crossed the image border and was cut without recentering
    pub clamped: bool,
}
