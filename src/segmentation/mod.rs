//! Detect, segment, extract: one image in, per-object crops out.

pub mod capability;
pub mod extract;
pub mod nms;
pub mod outline;

use std::path::PathBuf;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::config::{DetectionSettings, ExtractionSettings};
use crate::error::PipelineError;
use crate::models::{DetectionBox, Mask, Segment};
use crate::pipeline::{PipelineContext, numbered_png};
use crate::render;

pub use capability::{Detector, Segmenter};
pub use extract::MaskCropExtractor;
pub use nms::nms_class_agnostic;
pub use outline::outline_segment;

/// Result of one object-pipeline invocation
#[derive(Debug)]
pub struct ObjectRun {
    /// Boxes kept after NMS, in the order they were sent to the segmenter
    pub detections: Vec<DetectionBox>,
    pub segments: Vec<Segment>,
    /// Masks dropped for being empty or undersized
    pub rejected: usize,
}

/// Stateless per image; the capabilities are injected once and reused across calls
pub struct ObjectPipeline<D, S> {
    detector: D,
    segmenter: S,
    detection: DetectionSettings,
    extractor: MaskCropExtractor,
    context: PipelineContext,
}

impl<D: Detector, S: Segmenter> ObjectPipeline<D, S> {
    pub fn new(detector: D, segmenter: S) -> Self {
        Self {
            detector,
            segmenter,
            detection: DetectionSettings::default(),
            extractor: MaskCropExtractor::default(),
            context: PipelineContext::default(),
        }
    }

    pub fn with_detection(mut self, detection: DetectionSettings) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_extraction(mut self, extraction: ExtractionSettings) -> Self {
        self.extractor = MaskCropExtractor::new(extraction);
        self
    }

    /// Enable debug dumps. The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        self.context = self.context.with_debug(output_dir)?;
        Ok(self)
    }

    /// Low-threshold detection followed by class-agnostic NMS
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectionBox>, PipelineError> {
        let candidates = self
            .detector
            .detect(image, self.detection.confidence_threshold)
            .map_err(PipelineError::Detection)?;
        let candidate_count = candidates.len();
        let kept = nms_class_agnostic(candidates, self.detection.nms_iou_threshold);

        info!(candidates = candidate_count, kept = kept.len(), "detection finished");
        Ok(kept)
    }

    /// One batched segmenter call for all boxes against a single embedding
    pub fn segment(&self, image: &DynamicImage, boxes: &[DetectionBox]) -> Result<Vec<Mask>, PipelineError> {
        if boxes.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.segmenter.embed(image).map_err(PipelineError::Segmentation)?;
        let masks = self
            .segmenter
            .segment(image, &embedding, boxes)
            .map_err(PipelineError::Segmentation)?;

        if masks.len() != boxes.len() {
            return Err(PipelineError::MaskCountMismatch {
                boxes: boxes.len(),
                masks: masks.len(),
            });
        }

        let (image_width, image_height) = image.dimensions();
        for (index, mask) in masks.iter().enumerate() {
            let (mask_width, mask_height) = mask.dimensions();
            if (mask_width, mask_height) != (image_width, image_height) {
                return Err(PipelineError::MaskSizeMismatch {
                    index,
                    mask_width,
                    mask_height,
                    image_width,
                    image_height,
                });
            }
        }

        debug!(masks = masks.len(), "segmentation finished");
        Ok(masks)
    }

    pub fn run(&self, image: &DynamicImage) -> Result<ObjectRun, PipelineError> {
        let detections = self.detect(image)?;
        if self.context.debug_enabled() {
            let overlay = DynamicImage::ImageRgb8(render::draw_detections(image, &detections));
            self.context
                .save_stage(1, "detections", [(numbered_png(0), &overlay)])?;
        }

        let masks = self.segment(image, &detections)?;
        let segments = self.extractor.extract_all(image, &masks);
        let rejected = masks.len() - segments.len();

        info!(
            masks = masks.len(),
            segments = segments.len(),
            rejected,
            "extraction finished"
        );

        self.save_segments(&segments)?;

        Ok(ObjectRun {
            detections,
            segments,
            rejected,
        })
    }

    fn save_segments(&self, segments: &[Segment]) -> Result<(), PipelineError> {
        if !self.context.debug_enabled() {
            return Ok(());
        }

        self.context.save_stage(
            2,
            "segments",
            segments.iter().enumerate().map(|(i, s)| (numbered_png(i), &s.image)),
        )?;

        let cutouts: Vec<DynamicImage> = segments
            .iter()
            .filter_map(|s| s.transparent.clone().map(DynamicImage::ImageRgba8))
            .collect();
        self.context.save_stage(
            3,
            "cutouts",
            cutouts.iter().enumerate().map(|(i, c)| (numbered_png(i), c)),
        )
    }
}
