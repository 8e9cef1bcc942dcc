//! Configuration loading for `vellum.toml`.
//!
//! The file is looked up in the working directory first, then in the
//! platform config directory (`<config_dir>/vellum/vellum.toml`). Every
//! section and field is optional:
//!
//! ```toml
//! [carets]
//! max_count = 128
//! deduplicate = true
//! sort_by_position = true
//!
//! [layout]
//! max_concurrent_measurements = 4   # default: half the available cores
//! cache_minimum_capacity = 512
//! cache_maximum_capacity = 16384
//! cache_headroom_ratio = 0.75
//! auto_adjust_cache_size = true
//! trim_cache_after_update = true
//!
//! [document]
//! change_throttle_ms = 0            # 0 delivers changes immediately
//! undo_coalesce_ms = 750
//!
//! [viewport]
//! overscan_margin = 0.0
//! ```
//!
//! A missing file yields defaults. A file that fails to parse is reported
//! with a warning and also yields defaults, so a typo never prevents the
//! editor from starting. Unknown fields are ignored. Range checks happen when
//! the raw values are turned into option records
//! ([`Config::caret_options`], [`Config::layout_options`]).

use std::time::Duration;
use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use core_render::{LineLayoutSchedulerOptions, SchedulerError, default_concurrency};
use core_state::{CaretOptionsError, CaretSelectionManagerOptions, DEFAULT_MAX_CARET_COUNT};
use serde::Deserialize;
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "vellum.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CaretsConfig {
    pub max_count: usize,
    pub deduplicate: bool,
    pub sort_by_position: bool,
}

impl Default for CaretsConfig {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_MAX_CARET_COUNT,
            deduplicate: true,
            sort_by_position: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// `None` picks half the available parallelism.
    pub max_concurrent_measurements: Option<usize>,
    pub cache_minimum_capacity: usize,
    pub cache_maximum_capacity: usize,
    pub cache_headroom_ratio: f64,
    pub auto_adjust_cache_size: bool,
    pub trim_cache_after_update: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let defaults = LineLayoutSchedulerOptions::default();
        Self {
            max_concurrent_measurements: None,
            cache_minimum_capacity: defaults.cache_minimum_capacity,
            cache_maximum_capacity: defaults.cache_maximum_capacity,
            cache_headroom_ratio: defaults.cache_headroom_ratio,
            auto_adjust_cache_size: defaults.auto_adjust_cache_size,
            trim_cache_after_update: defaults.trim_cache_after_update,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DocumentConfig {
    pub change_throttle_ms: u64,
    pub undo_coalesce_ms: u64,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            change_throttle_ms: 0,
            undo_coalesce_ms: 750,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ViewportConfig {
    pub overscan_margin: f64,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct ConfigFile {
    pub carets: CaretsConfig,
    pub layout: LayoutConfig,
    pub document: DocumentConfig,
    pub viewport: ViewportConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Path the configuration was read from, if a file was found.
    pub source: Option<PathBuf>,
    pub raw: Option<String>,
    pub file: ConfigFile,
}

/// Best-effort config path: `./vellum.toml`, then the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("vellum").join(CONFIG_FILE_NAME);
    }
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "no config file; using defaults");
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(target: "config", path = %path.display(), "loaded");
            Ok(Config {
                source: Some(path),
                raw: Some(content),
                file,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config parse failed; using defaults");
            Ok(Config::default())
        }
    }
}

impl Config {
    pub fn caret_options(&self) -> Result<CaretSelectionManagerOptions, CaretOptionsError> {
        let c = &self.file.carets;
        CaretSelectionManagerOptions::new(c.max_count, c.deduplicate, c.sort_by_position)
    }

    pub fn layout_options(&self) -> Result<LineLayoutSchedulerOptions, SchedulerError> {
        let l = &self.file.layout;
        let options = LineLayoutSchedulerOptions {
            max_concurrent_measurements: l
                .max_concurrent_measurements
                .unwrap_or_else(default_concurrency),
            cache_minimum_capacity: l.cache_minimum_capacity,
            cache_maximum_capacity: l.cache_maximum_capacity,
            cache_headroom_ratio: l.cache_headroom_ratio,
            auto_adjust_cache_size: l.auto_adjust_cache_size,
            trim_cache_after_update: l.trim_cache_after_update,
        };
        options.validate()?;
        Ok(options)
    }

    /// Debounce window for the document change bus; zero means immediate.
    pub fn change_throttle(&self) -> Duration {
        Duration::from_millis(self.file.document.change_throttle_ms)
    }

    pub fn undo_coalesce_window(&self) -> Duration {
        Duration::from_millis(self.file.document.undo_coalesce_ms)
    }

    /// Negative or NaN margins read as zero.
    pub fn overscan_margin(&self) -> f64 {
        let margin = self.file.viewport.overscan_margin;
        if margin > 0.0 { margin } else { 0.0 }
    }

    /// Check every section that maps onto a validated option record.
    pub fn validate(&self) -> Result<()> {
        let origin = self
            .source
            .as_ref()
            .map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
        self.caret_options()
            .with_context(|| format!("[carets] in {origin}"))?;
        self.layout_options()
            .with_context(|| format!("[layout] in {origin}"))?;
        Ok(())
    }
}
