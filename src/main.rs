use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use image::{DynamicImage, GenericImageView, ImageReader};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use invscan::config::Settings;
use invscan::inventory::{InventoryPipeline, ReplayAnnotationClient, TileScheduler};
use invscan::models::{CropBox, Mask};
use invscan::render;
use invscan::segmentation::{MaskCropExtractor, outline_segment};

#[derive(Parser)]
#[command(name = "invscan")]
#[command(about = "Build item inventories from panoramas and cut objects out of images")]
struct Cli {
    /// JSON settings file (missing fields use defaults)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the tile plan for an image
    Tiles {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Tile side in pixels (default: gcd of width and height)
        #[arg(long)]
        tile_size: Option<u32>,
    },

    /// Build an inventory from recorded per-tile model responses
    Inventory {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Directory holding tile_RRR_CCC.txt responses
        #[arg(long, value_name = "DIR")]
        responses: PathBuf,

        #[arg(long)]
        tile_size: Option<u32>,

        /// Issue tile calls concurrently
        #[arg(long)]
        concurrent: bool,

        /// Write the inventory JSON here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Save the panorama with inventory boxes drawn
        #[arg(long, value_name = "FILE")]
        render: Option<PathBuf>,

        /// Save tile images to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
    },

    /// Cut square crops and transparent cutouts from recorded segmenter masks
    Extract {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Directory of mask images aligned to IMAGE, processed in file-name order
        #[arg(long, value_name = "DIR")]
        masks: PathBuf,

        #[arg(long, value_name = "DIR")]
        out_dir: PathBuf,

        #[arg(long)]
        padding: Option<u32>,

        #[arg(long)]
        min_size: Option<u32>,
    },
}

#[derive(Serialize)]
struct SegmentRecord {
    id: String,
    source_mask: String,
    bbox: CropBox,
    clamped: bool,
}

fn load_image(path: &Path) -> anyhow::Result<DynamicImage> {
    ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match &cli.config {
        Some(path) => Settings::from_json_file(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Command::Tiles { image_path, tile_size } => print_tiles(&image_path, tile_size),
        Command::Inventory {
            image_path,
            responses,
            tile_size,
            concurrent,
            output,
            render,
            debug_out,
        } => {
            let mut tiling = settings.tiling.clone();
            if tile_size.is_some() {
                tiling.tile_size = tile_size;
            }
            run_inventory(
                &image_path,
                &responses,
                tiling,
                &settings,
                concurrent,
                output,
                render,
                debug_out,
            )
        }
        Command::Extract {
            image_path,
            masks,
            out_dir,
            padding,
            min_size,
        } => {
            let mut extraction = settings.extraction;
            if let Some(padding) = padding {
                extraction.padding = padding;
            }
            if let Some(min_size) = min_size {
                extraction.min_size = min_size;
            }
            run_extract(&image_path, &masks, &out_dir, MaskCropExtractor::new(extraction))
        }
    }
}

fn print_tiles(image_path: &Path, tile_size: Option<u32>) -> anyhow::Result<()> {
    let img = load_image(image_path)?;
    let (width, height) = img.dimensions();
    let scheduler = TileScheduler::for_image(&img, tile_size)?;
    let (rows, cols) = scheduler.grid(width, height);

    println!(
        "{}x{} image, tile size {} -> {} rows x {} cols",
        width,
        height,
        scheduler.size(),
        rows,
        cols
    );
    for rect in scheduler.plan(width, height) {
        println!(
            "  #{:<4} row {:>3} col {:>3} at ({}, {}) {}x{}",
            rect.index, rect.row, rect.col, rect.x, rect.y, rect.width, rect.height
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_inventory(
    image_path: &Path,
    responses: &Path,
    tiling: invscan::config::TilingSettings,
    settings: &Settings,
    concurrent: bool,
    output: Option<PathBuf>,
    render_path: Option<PathBuf>,
    debug_out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let img = load_image(image_path)?;
    info!(path = %image_path.display(), width = img.width(), height = img.height(), "loaded panorama");

    let mut pipeline = InventoryPipeline::new(Arc::new(ReplayAnnotationClient::new(responses)))
        .with_tiling(tiling)
        .with_generation(settings.generation);
    if let Some(debug_dir) = debug_out {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    let run = if concurrent {
        let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
        runtime.block_on(pipeline.run_concurrent(&img))?
    } else {
        pipeline.run(&img)?
    };

    let json = run.inventory.to_json_string()?;
    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "inventory written");
        }
        None => println!("{}", json),
    }

    if let Some(path) = render_path {
        render::draw_inventory(&img, &run.inventory)
            .save(&path)
            .map_err(|e| anyhow::anyhow!("Failed to save rendered inventory: {}", e))?;
    }

    if !run.skipped.is_empty() {
        eprintln!("{} of {} tiles skipped", run.skipped.len(), run.tiles);
    }

    Ok(())
}

fn run_extract(image_path: &Path, masks_dir: &Path, out_dir: &Path, extractor: MaskCropExtractor) -> anyhow::Result<()> {
    let img = load_image(image_path)?;

    let mut mask_paths: Vec<PathBuf> = std::fs::read_dir(masks_dir)
        .with_context(|| format!("Failed to list {}", masks_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    mask_paths.sort();

    let masks = mask_paths
        .iter()
        .map(|path| load_image(path).map(|m| Mask::new(m.to_luma8())))
        .collect::<anyhow::Result<Vec<_>>>()?;

    for (path, mask) in mask_paths.iter().zip(&masks) {
        if mask.dimensions() != img.dimensions() {
            anyhow::bail!(
                "Mask {} is {}x{}, image is {}x{}",
                path.display(),
                mask.width(),
                mask.height(),
                img.width(),
                img.height()
            );
        }
    }

    let segments = extractor.extract_all(&img, &masks);
    std::fs::create_dir_all(out_dir)?;

    let mut records = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        segment
            .image
            .save(out_dir.join(format!("segment_{:02}.png", i)))
            .map_err(|e| anyhow::anyhow!("Failed to save segment: {}", e))?;
        if let Some(transparent) = &segment.transparent {
            transparent
                .save(out_dir.join(format!("transparent_{:02}.png", i)))
                .map_err(|e| anyhow::anyhow!("Failed to save cutout: {}", e))?;
        }
        outline_segment(segment)
            .save(out_dir.join(format!("outlined_{:02}.png", i)))
            .map_err(|e| anyhow::anyhow!("Failed to save outline: {}", e))?;

        records.push(SegmentRecord {
            id: segment.id.to_string(),
            source_mask: mask_paths[segment.source_index].display().to_string(),
            bbox: segment.bbox,
            clamped: segment.clamped,
        });
    }

    std::fs::write(out_dir.join("segments.json"), serde_json::to_string_pretty(&records)?)?;

    println!(
        "Extracted {} segments from {} masks into {}",
        segments.len(),
        masks.len(),
        out_dir.display()
    );
    Ok(())
}
