//! Box overlays for inspecting pipeline output.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::models::{DetectionBox, Inventory};

pub const INVENTORY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const DETECTION_COLOR: Rgb<u8> = Rgb([0, 128, 255]);

/// Draw a rectangle outline `thickness` pixels wide, growing inward.
/// Boxes that round to zero width or height are skipped.
pub fn draw_box(canvas: &mut RgbImage, x1: f64, y1: f64, x2: f64, y2: f64, color: Rgb<u8>, thickness: u32) {
    let left = x1.min(x2).round() as i64;
    let top = y1.min(y2).round() as i64;
    let right = x1.max(x2).round() as i64;
    let bottom = y1.max(y2).round() as i64;

    for inset in 0..i64::from(thickness) {
        let width = right - left - 2 * inset;
        let height = bottom - top - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at((left + inset) as i32, (top + inset) as i32).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// Panorama with every inventory box drawn in green
pub fn draw_inventory(image: &DynamicImage, inventory: &Inventory) -> RgbImage {
    let mut canvas = image.to_rgb8();
    for item in inventory.iter() {
        for b in &item.bounding_boxes {
            draw_box(&mut canvas, b.x1, b.y1, b.x2, b.y2, INVENTORY_COLOR, 2);
        }
    }
    canvas
}

pub fn draw_detections(image: &DynamicImage, detections: &[DetectionBox]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    for d in detections {
        draw_box(
            &mut canvas,
            f64::from(d.x_min),
            f64::from(d.y_min),
            f64::from(d.x_max),
            f64::from(d.y_max),
            DETECTION_COLOR,
            1,
        );
    }
    canvas
}
