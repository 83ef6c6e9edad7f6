use std::time::Duration;

use thiserror::Error;

/// Failure of a call into an external capability (annotation, detail, detector, segmenter)
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability request failed: {0}")]
    Request(String),

    #[error("capability call timed out after {0:?}")]
    Timeout(Duration),

    #[error("capability I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Model text that does not clean up into a single JSON object
#[derive(Debug, Error)]
#[error("malformed annotation ({reason}): {excerpt:?}")]
pub struct MalformedAnnotationError {
    pub reason: String,
    /// First characters of the cleaned text, for logs
    pub excerpt: String,
}

impl MalformedAnnotationError {
    const EXCERPT_CHARS: usize = 120;

    pub fn new(reason: impl Into<String>, cleaned: &str) -> Self {
        Self {
            reason: reason.into(),
            excerpt: cleaned.chars().take(Self::EXCERPT_CHARS).collect(),
        }
    }
}

/// Errors that are contained per tile (inventory) or retried per image (detail flow)
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error(transparent)]
    Malformed(#[from] MalformedAnnotationError),

    #[error(transparent)]
    CapabilityCall(#[from] CapabilityError),
}

/// Reasons a mask is excluded from extraction output
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    #[error("mask has no set pixels")]
    EmptyMask,

    #[error("mask extent {size}px is below the {min_size}px minimum")]
    UndersizedMask { size: u32, min_size: u32 },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TilingError {
    #[error("tile size must be positive")]
    InvalidTileSize,

    #[error("image has zero width or height")]
    EmptyImage,
}

/// Fatal errors for one pipeline invocation
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Tiling(#[from] TilingError),

    #[error("detector failed: {0}")]
    Detection(#[source] CapabilityError),

    #[error("segmenter failed: {0}")]
    Segmentation(#[source] CapabilityError),

    #[error("segmenter returned {masks} masks for {boxes} boxes")]
    MaskCountMismatch { boxes: usize, masks: usize },

    #[error("mask {index} is {mask_width}x{mask_height}, image is {image_width}x{image_height}")]
    MaskSizeMismatch {
        index: usize,
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("debug output failed: {0}")]
    Debug(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("tile worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
