use crate::models::DetectionBox;

/// Greedy non-max suppression across all classes.
///
/// Boxes are visited by descending confidence; any box overlapping an already
/// kept box with IoU above `iou_threshold` is dropped, whatever its class.
pub fn nms_class_agnostic(mut detections: Vec<DetectionBox>, iou_threshold: f32) -> Vec<DetectionBox> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<DetectionBox> = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }

        for j in (i + 1)..detections.len() {
            if !suppressed[j] && detections[i].iou(&detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }

        keep.push(detections[i].clone());
    }

    keep
}
