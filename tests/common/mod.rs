#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from invscan for tests
pub use invscan::config::{DetectionSettings, ExtractionSettings, RetryPolicy, TilingSettings};
pub use invscan::error::{AnnotationError, CapabilityError, ExtractError, PipelineError, TilingError};
pub use invscan::inventory::{InventoryPipeline, ReplayAnnotationClient, TileScheduler};
pub use invscan::models::{CropBox, DetectionBox, Inventory, Mask, NormalizedBox, PixelBox};
