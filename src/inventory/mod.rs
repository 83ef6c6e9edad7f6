//! Panorama inventory: tile, annotate, reproject, merge.

pub mod annotate;
pub mod merge;
pub mod parser;
pub mod reproject;
pub mod tiles;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, GenericImageView};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{GenerationConfig, TilingSettings};
use crate::error::{AnnotationError, CapabilityError, PipelineError};
use crate::models::{Inventory, PlacedItem};
use crate::pipeline::PipelineContext;

pub use annotate::{AnnotationClient, AnnotationRequest, ReplayAnnotationClient};
pub use merge::{FirstSeenWins, MergeStrategy, SumQuantities};
pub use reproject::{Reprojection, reproject};
pub use tiles::{Tile, TileRect, TileScheduler};

/// Reprojected items of one tile, in the order the model listed them
pub type TileItems = Vec<(String, PlacedItem)>;

/// A tile whose annotation was skipped
#[derive(Debug)]
pub struct TileFailure {
    pub tile: TileRect,
    pub error: AnnotationError,
}

/// Result of one panorama run
#[derive(Debug)]
pub struct InventoryRun {
    pub inventory: Inventory,
    pub tile_size: u32,
    pub tiles: usize,
    pub skipped: Vec<TileFailure>,
}

/// Annotate one tile and reproject its boxes. Errors are for the caller to contain.
pub fn annotate_tile(
    client: &dyn AnnotationClient,
    tile: &Tile,
    generation: GenerationConfig,
    reprojection: Reprojection,
) -> Result<TileItems, AnnotationError> {
    let request = AnnotationRequest::for_tile(tile, generation)
        .map_err(|e| CapabilityError::Request(format!("failed to encode tile: {e}")))?;
    let raw = client.annotate(&request)?;
    let items = parser::parse_annotation(&raw)?;
    Ok(reprojection.place_tile(&tile.rect, items))
}

pub struct InventoryPipeline {
    client: Arc<dyn AnnotationClient>,
    strategy: Arc<dyn MergeStrategy>,
    tiling: TilingSettings,
    generation: GenerationConfig,
    context: PipelineContext,
}

impl InventoryPipeline {
    pub fn new(client: Arc<dyn AnnotationClient>) -> Self {
        Self {
            client,
            strategy: Arc::new(FirstSeenWins),
            tiling: TilingSettings::default(),
            generation: GenerationConfig::default(),
            context: PipelineContext::default(),
        }
    }

    pub fn with_tiling(mut self, tiling: TilingSettings) -> Self {
        self.tiling = tiling;
        self
    }

    pub fn with_tile_size(mut self, tile_size: Option<u32>) -> Self {
        self.tiling.tile_size = tile_size;
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_merge_strategy(mut self, strategy: Arc<dyn MergeStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Dump every tile under `01_tiles/`. The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        self.context = self.context.with_debug(output_dir)?;
        Ok(self)
    }

    fn prepare(&self, image: &DynamicImage) -> Result<(TileScheduler, Reprojection, Vec<Tile>), PipelineError> {
        let scheduler = TileScheduler::for_image(image, self.tiling.tile_size)?;
        let (image_width, image_height) = image.dimensions();
        let reprojection = Reprojection {
            tile_size: scheduler.size(),
            image_width,
            image_height,
        };
        let tiles: Vec<Tile> = scheduler.tiles(image).collect();
        let (rows, cols) = scheduler.grid(image_width, image_height);

        info!(
            width = image_width,
            height = image_height,
            tile_size = scheduler.size(),
            rows,
            cols,
            "tiling panorama"
        );

        self.context.save_stage(
            1,
            "tiles",
            tiles
                .iter()
                .map(|t| (format!("r{:03}_c{:03}.png", t.rect.row, t.rect.col), &t.image)),
        )?;

        Ok((scheduler, reprojection, tiles))
    }

    /// Annotate tiles one after another in scan order.
    /// `call_timeout_ms` is not applied here; use [`InventoryPipeline::run_concurrent`] for it.
    pub fn run(&self, image: &DynamicImage) -> Result<InventoryRun, PipelineError> {
        if let Some(limit) = self.tiling.call_timeout() {
            warn!(?limit, "call timeout is only enforced by concurrent runs; ignoring it");
        }
        let (scheduler, reprojection, tiles) = self.prepare(image)?;

        let outcomes = tiles
            .iter()
            .map(|tile| {
                debug!(row = tile.rect.row, col = tile.rect.col, "annotating tile");
                let outcome = annotate_tile(self.client.as_ref(), tile, self.generation, reprojection);
                (tile.rect, outcome)
            })
            .collect();

        Ok(self.reconcile(scheduler.size(), outcomes))
    }

    /// Annotate tiles on the blocking pool, at most `max_concurrency` at a time.
    /// Results are merged in tile order once all calls have finished, so the
    /// output matches [`InventoryPipeline::run`].
    pub async fn run_concurrent(&self, image: &DynamicImage) -> Result<InventoryRun, PipelineError> {
        let (scheduler, reprojection, tiles) = self.prepare(image)?;
        let semaphore = Arc::new(Semaphore::new(self.tiling.max_concurrency.max(1)));
        let timeout = self.tiling.call_timeout();
        let total = tiles.len();

        let mut workers = JoinSet::new();
        for tile in tiles {
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            let generation = self.generation;

            workers.spawn(async move {
                let permit = semaphore.acquire_owned().await;
                let rect = tile.rect;
                // The slot is released when the call returns, not when the timeout fires
                let call = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    annotate_tile(client.as_ref(), &tile, generation, reprojection)
                });
                let outcome = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, call).await {
                        Ok(joined) => joined?,
                        Err(_) => Err(timed_out(limit)),
                    },
                    None => call.await?,
                };
                Ok::<_, tokio::task::JoinError>((rect, outcome))
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = workers.join_next().await {
            outcomes.push(joined??);
        }
        // Completion order is arbitrary; first-seen fields depend on scan order
        outcomes.sort_by_key(|(rect, _)| rect.index);

        Ok(self.reconcile(scheduler.size(), outcomes))
    }

    fn reconcile(
        &self,
        tile_size: u32,
        outcomes: Vec<(TileRect, Result<TileItems, AnnotationError>)>,
    ) -> InventoryRun {
        let tiles = outcomes.len();
        let mut inventory = Inventory::new();
        let mut skipped = Vec::new();

        for (rect, outcome) in outcomes {
            match outcome {
                Ok(items) => {
                    debug!(row = rect.row, col = rect.col, items = items.len(), "merging tile");
                    self.strategy.merge_tile(&mut inventory, items);
                }
                Err(error) => {
                    warn!(row = rect.row, col = rect.col, %error, "skipping tile");
                    skipped.push(TileFailure { tile: rect, error });
                }
            }
        }

        info!(
            items = inventory.len(),
            boxes = inventory.total_boxes(),
            tiles,
            skipped = skipped.len(),
            strategy = self.strategy.name(),
            "inventory merged"
        );

        InventoryRun {
            inventory,
            tile_size,
            tiles,
            skipped,
        }
    }
}

fn timed_out(limit: Duration) -> AnnotationError {
    AnnotationError::CapabilityCall(CapabilityError::Timeout(limit))
}
