pub mod config;
pub mod detail;
pub mod error;
pub mod inventory;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod segmentation;

pub use config::Settings;
pub use detail::{DetailClassifier, DetailClient, DetailOutcome, ItemDetails};
pub use error::{AnnotationError, CapabilityError, ExtractError, MalformedAnnotationError, PipelineError};
pub use inventory::{AnnotationClient, InventoryPipeline, InventoryRun, TileScheduler};
pub use models::{
    CropBox, DetectionBox, GlobalItem, Inventory, Mask, NormalizedBox, PixelBox, RawItem, Segment,
};
pub use pipeline::{DebugConfig, PipelineContext};
pub use segmentation::{Detector, MaskCropExtractor, ObjectPipeline, ObjectRun, Segmenter};
