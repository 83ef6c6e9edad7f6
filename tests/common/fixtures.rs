use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, ImageBuffer, Rgb};
use invscan::error::CapabilityError;
use invscan::inventory::{AnnotationClient, AnnotationRequest};
use invscan::models::{DetectionBox, Mask};
use invscan::{DetailClient, Detector, Segmenter};

/// RGB image whose pixel at (x, y) encodes its own position, so crops can be checked
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

/// Mask with the inclusive rectangle [x0, x1] x [y0, y1] set
pub fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> Mask {
    Mask::from_fn(width, height, |x, y| x >= x0 && x <= x1 && y >= y0 && y <= y1)
}

pub fn detection(x_min: f32, y_min: f32, x_max: f32, y_max: f32, confidence: f32, class_id: u32) -> DetectionBox {
    DetectionBox {
        x_min,
        y_min,
        x_max,
        y_max,
        confidence,
        class_id: Some(class_id),
    }
}

/// One-item annotation in the model's response format
pub fn item_response(name: &str, quantity: &str, x1: u32, y1: u32, x2: u32, y2: u32) -> String {
    format!(
        r#"{{"{name}": {{"quantity": "{quantity}", "cost_per_item": "10", "bounding_boxes": [{{"x1": {x1}, "x2": {x2}, "y1": {y1}, "y2": {y2}}}]}}}}"#
    )
}

enum Scripted {
    Text(String),
    Fail(String),
}

/// Annotation fake keyed by tile (row, col), with optional per-tile latency
pub struct ScriptedAnnotationClient {
    responses: HashMap<(u32, u32), Scripted>,
    delays: HashMap<(u32, u32), Duration>,
    fallback: Option<String>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedAnnotationClient {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            delays: HashMap::new(),
            fallback: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_response(mut self, row: u32, col: u32, text: impl Into<String>) -> Self {
        self.responses.insert((row, col), Scripted::Text(text.into()));
        self
    }

    pub fn with_failure(mut self, row: u32, col: u32, message: &str) -> Self {
        self.responses.insert((row, col), Scripted::Fail(message.to_string()));
        self
    }

    /// Response for every tile without a scripted one
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn with_delay(mut self, row: u32, col: u32, delay: Duration) -> Self {
        self.delays.insert((row, col), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl AnnotationClient for ScriptedAnnotationClient {
    fn annotate(&self, request: &AnnotationRequest) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let key = (request.tile.row, request.tile.col);
        if let Some(delay) = self.delays.get(&key) {
            std::thread::sleep(*delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match (self.responses.get(&key), &self.fallback) {
            (Some(Scripted::Text(text)), _) => Ok(text.clone()),
            (Some(Scripted::Fail(message)), _) => Err(CapabilityError::Request(message.clone())),
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(CapabilityError::Request(format!("no response for tile {:?}", key))),
        }
    }
}

/// Detail fake that plays back a fixed sequence; `Err` entries become request failures
pub struct ScriptedDetailClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedDetailClient {
    pub fn new(responses: Vec<Result<&str, &str>>) -> Self {
        let responses = responses
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DetailClient for ScriptedDetailClient {
    fn describe(&self, _image: &DynamicImage, _instructions: &str) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().expect("poisoned").pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(CapabilityError::Request(message)),
            None => Err(CapabilityError::Request("script exhausted".to_string())),
        }
    }
}

/// Detector that returns canned boxes, filtered by the requested threshold
pub struct StaticDetector {
    pub boxes: Vec<DetectionBox>,
}

impl Detector for StaticDetector {
    fn detect(&self, _image: &DynamicImage, confidence_threshold: f32) -> Result<Vec<DetectionBox>, CapabilityError> {
        Ok(self
            .boxes
            .iter()
            .filter(|b| b.confidence >= confidence_threshold)
            .cloned()
            .collect())
    }
}

pub struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&self, _image: &DynamicImage, _confidence_threshold: f32) -> Result<Vec<DetectionBox>, CapabilityError> {
        Err(CapabilityError::Request("detector offline".to_string()))
    }
}

/// Segmenter whose mask for each box is the box itself
pub struct BoxSegmenter {
    embed_calls: AtomicUsize,
    segment_calls: AtomicUsize,
    /// Return one mask fewer than requested
    pub drop_last: bool,
    /// Produce masks of this size instead of the image size
    pub mask_size: Option<(u32, u32)>,
}

impl BoxSegmenter {
    pub fn new() -> Self {
        Self {
            embed_calls: AtomicUsize::new(0),
            segment_calls: AtomicUsize::new(0),
            drop_last: false,
            mask_size: None,
        }
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn segment_calls(&self) -> usize {
        self.segment_calls.load(Ordering::SeqCst)
    }
}

impl Segmenter for BoxSegmenter {
    type Embedding = (u32, u32);

    fn embed(&self, image: &DynamicImage) -> Result<Self::Embedding, CapabilityError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok((image.width(), image.height()))
    }

    fn segment(
        &self,
        _image: &DynamicImage,
        embedding: &Self::Embedding,
        boxes: &[DetectionBox],
    ) -> Result<Vec<Mask>, CapabilityError> {
        self.segment_calls.fetch_add(1, Ordering::SeqCst);
        let (width, height) = self.mask_size.unwrap_or(*embedding);

        let mut masks: Vec<Mask> = boxes
            .iter()
            .map(|b| {
                rect_mask(
                    width,
                    height,
                    b.x_min as u32,
                    b.y_min as u32,
                    b.x_max as u32,
                    b.y_max as u32,
                )
            })
            .collect();
        if self.drop_last {
            masks.pop();
        }
        Ok(masks)
    }
}
