use std::time::Duration;

use invscan::Settings;
use invscan::config::RetryPolicy;
use invscan::pipeline::{DebugConfig, numbered_png};

#[test]
fn test_defaults() {
    let settings = Settings::default();

    assert_eq!(settings.tiling.tile_size, None);
    assert_eq!(settings.tiling.max_concurrency, 4);
    assert_eq!(settings.tiling.call_timeout(), None);
    assert_eq!(settings.generation.max_output_tokens, 8192);
    assert_eq!(settings.generation.temperature, 1.0);
    assert_eq!(settings.generation.top_p, 0.95);
    assert_eq!(settings.detection.confidence_threshold, 0.01);
    assert_eq!(settings.detection.nms_iou_threshold, 0.05);
    assert_eq!(settings.extraction.padding, 10);
    assert_eq!(settings.extraction.min_size, 50);
    assert_eq!(settings.retry.max_attempts, 3);
    assert_eq!(settings.retry.delay(), Duration::ZERO);
}

#[test]
fn test_partial_settings_file() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"tiling": {"tile_size": 256, "call_timeout_ms": 1500}, "extraction": {"padding": 4}}"#,
    )?;

    let settings = Settings::from_json_file(&path)?;

    assert_eq!(settings.tiling.tile_size, Some(256));
    assert_eq!(settings.tiling.max_concurrency, 4);
    assert_eq!(settings.tiling.call_timeout(), Some(Duration::from_millis(1500)));
    assert_eq!(settings.extraction.padding, 4);
    assert_eq!(settings.extraction.min_size, 50);
    assert_eq!(settings.retry, RetryPolicy::default());
    Ok(())
}

#[test]
fn test_invalid_settings_file_is_reported() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"tiling": {"tile_size": "large"}}"#)?;

    assert!(Settings::from_json_file(&path).is_err());
    assert!(Settings::from_json_file(dir.path().join("missing.json")).is_err());
    Ok(())
}

#[test]
fn test_debug_config_stage_dirs() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let debug = DebugConfig::new(dir.path().join("out"))?;

    assert!(dir.path().join("out").is_dir());
    assert_eq!(debug.stage_dir(2, "Segments"), dir.path().join("out").join("02_segments"));
    assert_eq!(debug.stage_dir(1, "raw tiles"), dir.path().join("out").join("01_raw_tiles"));
    assert_eq!(numbered_png(0), "01.png");
    Ok(())
}
