//! Application configuration.
//!
//! Handles loading, validating, and merging `carlot.toml`. Stock defaults are
//! the base layer; a user file overrides any subset of keys. The resolved
//! [`AppConfig`] is built once at startup and passed by reference to whatever
//! needs it. Nothing here is global.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [band]
//! min_kb = 50                   # Lower bound of the output size band
//! max_kb = 100                  # Upper bound of the output size band
//!
//! [search]
//! max_attempts = 8              # Encode attempts per file, failed ones included
//! max_dimension = 1920          # Long-edge cap in pixels
//! min_dimension = 480           # Long edge is never reduced below this
//! initial_quality_shrink = 0.7  # Starting quality when the file is too large
//! initial_quality_grow = 0.9    # Starting quality when the file is too small
//! shrink_factor = 0.8           # Quality multiplier after a too-large attempt
//! grow_factor = 1.2             # Quality multiplier after a too-small attempt
//! min_quality = 0.1             # Quality floor; below it resolution is reduced
//! dimension_step = 0.75         # Long-edge multiplier at the quality floor
//!
//! [upload]
//! key_prefix = "cars"           # First segment of every object key
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{NormalizeConfig, Quality, StepRules, TargetBand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `carlot.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Target output size band.
    pub band: BandConfig,
    /// Quality/resolution search settings.
    pub search: SearchConfig,
    /// Object key layout.
    pub upload: UploadConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let band = &self.band;
        if band.min_kb == 0 {
            return Err(ConfigError::Validation("band.min_kb must be positive".into()));
        }
        if band.min_kb >= band.max_kb {
            return Err(ConfigError::Validation(
                "band.min_kb must be less than band.max_kb".into(),
            ));
        }

        let search = &self.search;
        if search.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "search.max_attempts must be at least 1".into(),
            ));
        }
        for (key, value) in [
            ("search.initial_quality_shrink", search.initial_quality_shrink),
            ("search.initial_quality_grow", search.initial_quality_grow),
            ("search.min_quality", search.min_quality),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Validation(format!("{key} must be in (0, 1]")));
            }
        }
        if !(search.shrink_factor > 0.0 && search.shrink_factor < 1.0) {
            return Err(ConfigError::Validation(
                "search.shrink_factor must be in (0, 1)".into(),
            ));
        }
        if !(search.grow_factor > 1.0 && search.grow_factor.is_finite()) {
            return Err(ConfigError::Validation(
                "search.grow_factor must be greater than 1".into(),
            ));
        }
        if !(search.dimension_step > 0.0 && search.dimension_step < 1.0) {
            return Err(ConfigError::Validation(
                "search.dimension_step must be in (0, 1)".into(),
            ));
        }
        if search.min_dimension == 0 || search.min_dimension > search.max_dimension {
            return Err(ConfigError::Validation(
                "search.min_dimension must be between 1 and search.max_dimension".into(),
            ));
        }

        let prefix = &self.upload.key_prefix;
        if prefix.is_empty() || prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(ConfigError::Validation(
                "upload.key_prefix must be non-empty without leading or trailing '/'".into(),
            ));
        }
        if prefix.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return Err(ConfigError::Validation(
                "upload.key_prefix contains an empty or relative segment".into(),
            ));
        }
        Ok(())
    }

    /// Settings for the size normalizer.
    pub fn normalize_config(&self) -> NormalizeConfig {
        let search = &self.search;
        NormalizeConfig {
            band: TargetBand::from_kb(self.band.min_kb, self.band.max_kb),
            max_attempts: search.max_attempts,
            max_dimension: search.max_dimension,
            initial_quality_shrink: Quality::new(search.initial_quality_shrink),
            initial_quality_grow: Quality::new(search.initial_quality_grow),
            rules: StepRules {
                shrink_factor: search.shrink_factor,
                grow_factor: search.grow_factor,
                min_quality: Quality::new(search.min_quality),
                dimension_step: search.dimension_step,
                min_dimension: search.min_dimension,
            },
        }
    }
}

/// Output size band, in kilobytes (1 KB = 1024 bytes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BandConfig {
    pub min_kb: u64,
    pub max_kb: u64,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            min_kb: 50,
            max_kb: 100,
        }
    }
}

/// Quality/resolution search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub max_attempts: u32,
    pub max_dimension: u32,
    pub min_dimension: u32,
    pub initial_quality_shrink: f32,
    pub initial_quality_grow: f32,
    pub shrink_factor: f32,
    pub grow_factor: f32,
    pub min_quality: f32,
    pub dimension_step: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            max_dimension: 1920,
            min_dimension: 480,
            initial_quality_shrink: 0.7,
            initial_quality_grow: 0.9,
            shrink_factor: 0.8,
            grow_factor: 1.2,
            min_quality: 0.1,
            dimension_step: 0.75,
        }
    }
}

/// Object key layout for uploads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// First key segment: `{key_prefix}/{owner}/...`.
    pub key_prefix: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            key_prefix: "cars".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the stock defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `carlot.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# carlot configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Target size band
# ---------------------------------------------------------------------------
[band]
# Listing photos are re-encoded until their size falls in [min_kb, max_kb].
# 1 KB = 1024 bytes. Files already inside the band are uploaded untouched.
min_kb = 50
max_kb = 100

# ---------------------------------------------------------------------------
# Quality / resolution search
# ---------------------------------------------------------------------------
[search]
# Encode attempts per file, failed ones included. When the band is not hit,
# the attempt closest to the middle of the band is kept.
max_attempts = 8

# Long-edge cap in pixels. Larger photos are scaled down before encoding.
max_dimension = 1920

# The long edge is never reduced below this, even at the quality floor.
min_dimension = 480

# Starting quality (0-1] when the photo is above / below the band.
initial_quality_shrink = 0.7
initial_quality_grow = 0.9

# Quality multipliers applied after a too-large / too-small attempt.
shrink_factor = 0.8
grow_factor = 1.2

# Quality floor. Once reached, the long edge is multiplied by dimension_step
# on each further too-large attempt.
min_quality = 0.1
dimension_step = 0.75

# ---------------------------------------------------------------------------
# Upload layout
# ---------------------------------------------------------------------------
[upload]
# Object keys look like {key_prefix}/{owner}/{stamp}-{index}-{hash}-{name}.jpg
key_prefix = "cars"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
