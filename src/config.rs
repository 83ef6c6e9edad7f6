//! Run settings with defaults matching the deployed pipeline.
//!
//! Every section is optional in the JSON file; missing fields fall back to
//! their defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tiling: TilingSettings,
    pub generation: GenerationConfig,
    pub detection: DetectionSettings,
    pub extraction: ExtractionSettings,
    pub retry: RetryPolicy,
}

impl Settings {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingSettings {
    /// Square tile side in pixels; `None` uses gcd(width, height)
    pub tile_size: Option<u32>,
    /// Upper bound on in-flight annotation calls in concurrent runs
    pub max_concurrency: usize,
    /// Per-call limit for concurrent runs; a sequential run ignores it
    pub call_timeout_ms: Option<u64>,
}

impl TilingSettings {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for TilingSettings {
    fn default() -> Self {
        Self {
            tile_size: None,
            max_concurrency: 4,
            call_timeout_ms: None,
        }
    }
}

/// Sampling parameters forwarded to the recognition model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 8192,
            temperature: 1.0,
            top_p: 0.95,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Low; NMS removes the duplicates
    pub confidence_threshold: f32,
    pub nms_iou_threshold: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.01,
            nms_iou_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Pixels added to the mask extent before squaring
    pub padding: u32,
    /// Masks whose larger extent is below this are dropped
    pub min_size: u32,
    pub cutouts: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            padding: 10,
            min_size: 50,
            cutouts: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn no_delay(max_attempts: u32) -> Self {
        Self { max_attempts, delay_ms: 0 }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_delay(3)
    }
}
