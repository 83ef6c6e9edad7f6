use std::sync::Arc;

use image::DynamicImage;

use crate::error::CapabilityError;
use crate::models::{DetectionBox, Mask};

/// Object detector. Expensive to construct; build once and share across calls.
pub trait Detector: Send + Sync {
    /// Candidate boxes in source pixel space with confidence at or above `confidence_threshold`
    fn detect(&self, image: &DynamicImage, confidence_threshold: f32) -> Result<Vec<DetectionBox>, CapabilityError>;
}

/// Box-prompted segmenter working against one shared image embedding
pub trait Segmenter: Send + Sync {
    type Embedding;

    fn embed(&self, image: &DynamicImage) -> Result<Self::Embedding, CapabilityError>;

    /// Exactly one mask per box, in box order, already resized to the image dimensions
    fn segment(
        &self,
        image: &DynamicImage,
        embedding: &Self::Embedding,
        boxes: &[DetectionBox],
    ) -> Result<Vec<Mask>, CapabilityError>;
}

impl<T: Detector + ?Sized> Detector for &T {
    fn detect(&self, image: &DynamicImage, confidence_threshold: f32) -> Result<Vec<DetectionBox>, CapabilityError> {
        (**self).detect(image, confidence_threshold)
    }
}

impl<T: Detector + ?Sized> Detector for Arc<T> {
    fn detect(&self, image: &DynamicImage, confidence_threshold: f32) -> Result<Vec<DetectionBox>, CapabilityError> {
        (**self).detect(image, confidence_threshold)
    }
}

impl<T: Segmenter + ?Sized> Segmenter for &T {
    type Embedding = T::Embedding;

    fn embed(&self, image: &DynamicImage) -> Result<Self::Embedding, CapabilityError> {
        (**self).embed(image)
    }

    fn segment(
        &self,
        image: &DynamicImage,
        embedding: &Self::Embedding,
        boxes: &[DetectionBox],
    ) -> Result<Vec<Mask>, CapabilityError> {
        (**self).segment(image, embedding, boxes)
    }
}

impl<T: Segmenter + ?Sized> Segmenter for Arc<T> {
    type Embedding = T::Embedding;

    fn embed(&self, image: &DynamicImage) -> Result<Self::Embedding, CapabilityError> {
        (**self).embed(image)
    }

    fn segment(
        &self,
        image: &DynamicImage,
        embedding: &Self::Embedding,
        boxes: &[DetectionBox],
    ) -> Result<Vec<Mask>, CapabilityError> {
        (**self).segment(image, embedding, boxes)
    }
}
