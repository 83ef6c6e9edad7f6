use image::{Rgb, RgbImage};
use imageproc::contours::{Contour, find_contours};

use crate::models::Segment;

pub const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Crop with the mask border painted in a thin red line, the form the detail capability expects
pub fn outline_segment(segment: &Segment) -> RgbImage {
    let mut outlined = segment.image.to_rgb8();
    let contours: Vec<Contour<u32>> = find_contours(&segment.mask);

    for contour in &contours {
        for point in &contour.points {
            if point.x < outlined.width() && point.y < outlined.height() {
                outlined.put_pixel(point.x, point.y, OUTLINE_COLOR);
            }
        }
    }

    outlined
}
