//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `asset-derivatives.toml`. Stock
//! defaults are the base layer; a user file overrides only the keys it sets.
//!
//! ## Configuration Options
//!
//! ```toml
//! # Every key is optional; these are the defaults
//!
//! quality = 75                          # Encoder quality (1-100)
//! formats = ["webp", "avif", "jpeg"]    # First entry is the primary format
//! sizes = [640, 750, 828, 1080, 1200, 1920, 2048]  # Responsive widths, ascending
//! placeholder = true                    # Inline blurred placeholder per asset
//! cache_dir = ".cache/images"           # Created for production builds only
//! output_dir = "dist/images"            # Where finalize writes derivatives
//! public_path = "/images"               # URL prefix used in manifests
//! cache_capacity = 0                    # Max cached assets (0 = unbounded)
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Sparse Files
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! formats = ["avif", "webp"]
//! ```
//!
//! Unknown keys fail the load.

use crate::imaging::{OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "asset-derivatives.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `asset-derivatives.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Encoder quality for every derivative (1 = worst, 100 = best).
    pub quality: u32,
    /// Output formats in priority order. The first one backs `src`/`srcSet`.
    pub formats: Vec<OutputFormat>,
    /// Candidate widths for responsive derivatives, strictly ascending.
    pub sizes: Vec<u32>,
    /// Whether manifests carry an inline blurred placeholder.
    pub placeholder: bool,
    /// On-disk cache directory, created at configuration time for builds.
    pub cache_dir: String,
    /// Directory that receives derivative files at finalize.
    pub output_dir: String,
    /// URL prefix for derivative references in manifests.
    pub public_path: String,
    /// Maximum number of cached assets. 0 keeps everything.
    pub cache_capacity: usize,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default().value(),
            formats: vec![OutputFormat::Webp, OutputFormat::Avif, OutputFormat::Jpeg],
            sizes: vec![640, 750, 828, 1080, 1200, 1920, 2048],
            placeholder: true,
            cache_dir: ".cache/images".to_string(),
            output_dir: "dist/images".to_string(),
            public_path: "/images".to_string(),
            cache_capacity: 0,
            processing: ProcessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Validation("quality must be 1-100".into()));
        }
        if self.formats.is_empty() {
            return Err(ConfigError::Validation("formats must not be empty".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.formats.iter().find(|f| !seen.insert(**f)) {
            return Err(ConfigError::Validation(format!(
                "formats lists {} more than once",
                dup
            )));
        }
        if self.sizes.is_empty() {
            return Err(ConfigError::Validation("sizes must not be empty".into()));
        }
        if self.sizes.contains(&0) {
            return Err(ConfigError::Validation("sizes must be non-zero".into()));
        }
        if !self.sizes.windows(2).all(|w| w[0] < w[1]) {
            return Err(ConfigError::Validation(
                "sizes must be strictly ascending".into(),
            ));
        }
        Ok(())
    }

    /// The format used for `src` and `srcSet`.
    pub fn primary_format(&self) -> OutputFormat {
        self.formats.first().copied().unwrap_or(OutputFormat::Webp)
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Upper bound on encode workers. Unset means one per CPU core.
    pub max_processes: Option<usize>,
}

/// Worker count for the rayon pool: `max_processes` clamped to `1..=cores`,
/// or every core when unset.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// [`PipelineConfig::default`] as a TOML table, the bottom merge layer.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
}

/// Deep-merge two TOML values. Tables merge per key; any other overlay
/// value replaces the base value outright.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `path` as an untyped TOML value, or `None` when there is no file.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Apply the user layer (if any), deserialize, and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `asset-derivatives.toml` from `path` over the stock defaults.
///
/// A missing file is not an error; a malformed or invalid one is.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// The stock config with every key documented, as printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# Asset Derivatives Configuration
# ===============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# Encoder quality for every derivative (1 = worst, 100 = best).
# WebP is encoded losslessly and PNG has no quality knob; both ignore this.
quality = 75

# Output formats in priority order. The first entry is the primary format:
# it backs the manifest's `src` and every `srcSet` candidate.
# Choices: "webp", "avif", "jpeg", "png".
formats = ["webp", "avif", "jpeg"]

# Candidate widths for responsive derivatives, strictly ascending.
# Widths larger than a source image are skipped for that image.
sizes = [640, 750, 828, 1080, 1200, 1920, 2048]

# Embed a tiny blurred JPEG placeholder in each manifest.
placeholder = true

# Cache directory, created when the pipeline runs a production build.
cache_dir = ".cache/images"

# Directory that receives derivative files when the build finalizes.
output_dir = "dist/images"

# URL prefix for derivative references in manifests.
public_path = "/images"

# Maximum number of processed assets kept in memory.
# 0 keeps everything; otherwise the least recently used asset is evicted.
cache_capacity = 0

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit to use all CPU cores. Values above the core count are clamped down.
# max_processes = 4
"##
}
