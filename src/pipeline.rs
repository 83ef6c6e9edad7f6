use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::PipelineError;

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

impl DebugConfig {
    /// The directory must be empty or non-existent
    pub fn new(output_dir: PathBuf) -> anyhow::Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        Ok(Self { output_dir })
    }

    /// Directory for one stage, e.g. `02_segments`
    pub fn stage_dir(&self, stage_index: usize, stage_name: &str) -> PathBuf {
        let dir_name = format!(
            "{:02}_{}",
            stage_index,
            stage_name.to_lowercase().replace(' ', "_")
        );
        self.output_dir.join(dir_name)
    }
}

/// Context shared by every stage of a pipeline run
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

impl PipelineContext {
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        self.debug = Some(DebugConfig::new(output_dir)?);
        Ok(self)
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.is_some()
    }

    /// Save named images for a stage; no-op unless debug output is enabled
    pub fn save_stage<'a, I>(&self, stage_index: usize, stage_name: &str, images: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = (String, &'a DynamicImage)>,
    {
        let Some(debug_config) = &self.debug else {
            return Ok(());
        };

        let stage_dir = debug_config.stage_dir(stage_index, stage_name);
        std::fs::create_dir_all(&stage_dir)?;

        let mut saved = 0usize;
        for (file_name, image) in images {
            save_png(image, &stage_dir.join(file_name))?;
            saved += 1;
        }

        debug!(stage = stage_name, saved, dir = %stage_dir.display(), "saved debug images");
        Ok(())
    }
}

fn save_png(image: &DynamicImage, path: &Path) -> Result<(), PipelineError> {
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Numbered file name used for per-object debug dumps, 1-indexed for readability
pub fn numbered_png(index: usize) -> String {
    format!("{:02}.png", index + 1)
}
