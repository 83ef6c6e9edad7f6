use image::{DynamicImage, GenericImageView, GrayImage, Luma, Rgba, RgbaImage};
use tracing::debug;
use uuid::Uuid;

use crate::config::ExtractionSettings;
use crate::error::ExtractError;
use crate::models::{CropBox, Mask, MaskBounds, Segment};

/// Square crop placement for one mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquarePlacement {
    pub bbox: CropBox,
    /// Side of the unclamped square
    pub side: u32,
    pub clamped: bool,
}

/// Turns segmenter masks into padded square crops and transparent cutouts
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskCropExtractor {
    settings: ExtractionSettings,
}

impl MaskCropExtractor {
    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Center a padded square on the mask bounds and clamp each side to the image.
    /// A square cut by the border is not shifted back inside, so edge crops can be
    /// smaller and off-center.
    pub fn place_square(
        &self,
        bounds: MaskBounds,
        image_width: u32,
        image_height: u32,
    ) -> Result<SquarePlacement, ExtractError> {
        let size = bounds.extent_width().max(bounds.extent_height());
        if size < self.settings.min_size {
            return Err(ExtractError::UndersizedMask {
                size,
                min_size: self.settings.min_size,
            });
        }

        let half = (i64::from(size) + i64::from(self.settings.padding)) / 2;
        let (center_x, center_y) = bounds.center();
        let (center_x, center_y) = (i64::from(center_x), i64::from(center_y));

        let ideal = (center_x - half, center_y - half, center_x + half, center_y + half);
        let x_max = ideal.2.min(i64::from(image_width));
        let y_max = ideal.3.min(i64::from(image_height));
        let x_min = ideal.0.max(0).min(x_max);
        let y_min = ideal.1.max(0).min(y_max);

        let clamped = (x_min, y_min, x_max, y_max) != ideal;

        // All four values are within [0, image dimension] here
        Ok(SquarePlacement {
            bbox: CropBox {
                x_min: x_min as u32,
                y_min: y_min as u32,
                x_max: x_max as u32,
                y_max: y_max as u32,
            },
            side: u32::try_from(2 * half).unwrap_or(u32::MAX),
            clamped,
        })
    }

    pub fn extract(&self, image: &DynamicImage, mask: &Mask, source_index: usize) -> Result<Segment, ExtractError> {
        let bounds = mask.tight_bounds().ok_or(ExtractError::EmptyMask)?;
        let (image_width, image_height) = image.dimensions();
        let placement = self.place_square(bounds, image_width, image_height)?;
        let bbox = placement.bbox;

        let crop = image.crop_imm(bbox.x_min, bbox.y_min, bbox.width(), bbox.height());
        let local_mask = crop_mask(mask, bbox);
        let transparent = self
            .settings
            .cutouts
            .then(|| apply_alpha(&crop, &local_mask));

        Ok(Segment {
            id: Uuid::new_v4(),
            source_index,
            image: crop,
            bbox,
            transparent,
            mask: local_mask,
            clamped: placement.clamped,
        })
    }

    /// Extract every usable mask; rejected masks are dropped so outputs stay index-aligned
    pub fn extract_all(&self, image: &DynamicImage, masks: &[Mask]) -> Vec<Segment> {
        masks
            .iter()
            .enumerate()
            .filter_map(|(index, mask)| match self.extract(image, mask, index) {
                Ok(segment) => Some(segment),
                Err(reason) => {
                    debug!(mask = index, %reason, "mask excluded");
                    None
                }
            })
            .collect()
    }
}

/// Mask membership restricted to `bbox`, as a crop-sized 0/255 image
pub fn crop_mask(mask: &Mask, bbox: CropBox) -> GrayImage {
    GrayImage::from_fn(bbox.width(), bbox.height(), |x, y| {
        if mask.contains(bbox.x_min + x, bbox.y_min + y) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// RGBA copy of `crop` that is fully transparent outside the mask
pub fn apply_alpha(crop: &DynamicImage, local_mask: &GrayImage) -> RgbaImage {
    let rgba = crop.to_rgba8();
    RgbaImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let pixel = rgba.get_pixel(x, y);
        let alpha = if local_mask.get_pixel(x, y)[0] > 0 { pixel[3] } else { 0 };
        Rgba([pixel[0], pixel[1], pixel[2], alpha])
    })
}

/// Split segments into the three index-aligned lists: crops, boxes, cutouts
pub fn into_parts(segments: Vec<Segment>) -> (Vec<DynamicImage>, Vec<CropBox>, Vec<Option<RgbaImage>>) {
    let mut crops = Vec::with_capacity(segments.len());
    let mut boxes = Vec::with_capacity(segments.len());
    let mut cutouts = Vec::with_capacity(segments.len());

    for segment in segments {
        crops.push(segment.image);
        boxes.push(segment.bbox);
        cutouts.push(segment.transparent);
    }

    (crops, boxes, cutouts)
}
