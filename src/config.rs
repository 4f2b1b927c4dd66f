//! Middleware configuration module.
//!
//! Handles loading and validating `adaptive-images.toml`. Every option has a
//! default, so a config file only needs the values it wants to override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! image_types = [".jpg", ".png", ".jpeg", ".gif"]  # Extensions eligible for adaptation
//! breakpoints = [1382, 992, 768, 480]            # Candidate widths (any order)
//! cache_path = "ai-cache"                        # Cache directory, relative to the root
//! jpg_quality = 75                               # Encoding quality (0-100, 0 encodes as 1)
//! sharpen = true                                 # Sharpen after downscaling
//! watch_cache = true                             # Regenerate entries older than cache_period
//! cache_period = 604800                          # Seconds (7 days)
//! set_expiration_headers = true                  # Emit Cache-Control / Expires
//! max_age_in_millis = true                       # max-age carries milliseconds (legacy)
//! processor = "rust"                             # "rust" or "magick"
//! use_image_magick = false                       # magick processor: ImageMagick instead of GraphicsMagick
//! compression = "None"                           # None, BZip, Fax, Group4, JPEG, Lossless, LZW, RLE, Zip, LZMA
//! debug = false                                  # Per-request diagnostics at debug level
//! # generation_timeout_secs = 30                 # Abort slow resizes (unset = wait forever)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Compression, DerivativeConfig, Quality, Sharpening};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use std::time::Duration;
use thiserror::Error;

/// Name of the config file looked up by [`load_config`].
pub const CONFIG_FILENAME: &str = "adaptive-images.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Which image processor produces derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Processor {
    /// Pure Rust, in-process.
    #[default]
    Rust,
    /// External GraphicsMagick or ImageMagick binary, see `use_image_magick`.
    Magick,
}

/// Middleware configuration loaded from `adaptive-images.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdaptiveConfig {
    /// File extensions eligible for adaptation, with or without leading dot.
    pub image_types: Vec<String>,
    /// Candidate target widths in pixels. Order does not matter.
    pub breakpoints: Vec<u32>,
    /// Cache directory, relative to the served root.
    pub cache_path: String,
    /// Encoding quality (0 = worst, 100 = best). Encoders take 1-100, so 0
    /// is encoded as 1.
    pub jpg_quality: u32,
    /// Apply a light unsharp mask after downscaling.
    pub sharpen: bool,
    /// Regenerate cache entries older than `cache_period`.
    pub watch_cache: bool,
    /// Cache validity window in seconds; also drives the expiration headers.
    pub cache_period: u64,
    /// Emit `Cache-Control` and `Expires` on adapted responses.
    pub set_expiration_headers: bool,
    /// Emit `max-age` as `cache_period * 1000`, the magnitude earlier
    /// deployments served. Set to `false` for a value in seconds.
    pub max_age_in_millis: bool,
    /// Image processor used to generate derivatives.
    pub processor: Processor,
    /// With the `magick` processor, run ImageMagick rather than GraphicsMagick.
    pub use_image_magick: bool,
    /// Compression algorithm name.
    pub compression: Compression,
    /// Log per-request decisions at debug level.
    pub debug: bool,
    /// Upper bound on a single resize, in seconds.
    pub generation_timeout_secs: Option<u64>,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            image_types: [".jpg", ".png", ".jpeg", ".gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            breakpoints: vec![1382, 992, 768, 480],
            cache_path: "ai-cache".to_string(),
            jpg_quality: 75,
            sharpen: true,
            watch_cache: true,
            cache_period: 60 * 60 * 24 * 7,
            set_expiration_headers: true,
            max_age_in_millis: true,
            processor: Processor::default(),
            use_image_magick: false,
            compression: Compression::default(),
            debug: false,
            generation_timeout_secs: None,
        }
    }
}

impl AdaptiveConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jpg_quality > 100 {
            return Err(ConfigError::Validation(
                "jpg_quality must be 0-100".into(),
            ));
        }
        if self.breakpoints.is_empty() {
            return Err(ConfigError::Validation(
                "breakpoints must not be empty".into(),
            ));
        }
        if self.breakpoints.contains(&0) {
            return Err(ConfigError::Validation(
                "breakpoints must be positive".into(),
            ));
        }
        if self.image_types.iter().all(|t| t.trim_start_matches('.').is_empty()) {
            return Err(ConfigError::Validation(
                "image_types must name at least one extension".into(),
            ));
        }
        let cache_path = Path::new(&self.cache_path);
        let mut components = cache_path.components().peekable();
        if components.peek().is_none()
            || !components.all(|c| matches!(c, Component::Normal(_) | Component::RootDir))
        {
            return Err(ConfigError::Validation(
                "cache_path must be a relative directory inside the root".into(),
            ));
        }
        if self.generation_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "generation_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Encoding settings handed to the image backend.
    pub fn derivative_config(&self) -> DerivativeConfig {
        DerivativeConfig {
            quality: Quality::new(self.jpg_quality),
            compression: self.compression,
            sharpening: self.sharpen.then(Sharpening::light),
        }
    }

    /// Resize timeout, if configured.
    pub fn generation_timeout(&self) -> Option<Duration> {
        self.generation_timeout_secs.map(Duration::from_secs)
    }

    /// The `max-age` value emitted in `Cache-Control`.
    pub fn max_age(&self) -> u64 {
        if self.max_age_in_millis {
            self.cache_period.saturating_mul(1000)
        } else {
            self.cache_period
        }
    }
}

/// Parse and validate a config from TOML text.
pub fn parse_config(content: &str) -> Result<AdaptiveConfig, ConfigError> {
    let config: AdaptiveConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from `adaptive-images.toml` in the given directory.
///
/// Returns the stock defaults when the file does not exist. Rejects unknown
/// keys and validates the result.
pub fn load_config(dir: &Path) -> Result<AdaptiveConfig, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(AdaptiveConfig::default());
    }
    let content = fs::read_to_string(&config_path)?;
    parse_config(&content)
}

/// Returns a fully-commented stock `adaptive-images.toml` with all keys.
pub fn stock_config_toml() -> &'static str {
    r##"# Adaptive Images Configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# File extensions eligible for adaptation. Requests for anything else pass
# straight through to the next handler.
image_types = [".jpg", ".png", ".jpeg", ".gif"]

# Target widths in pixels. The smallest breakpoint that fits the client's
# effective width is served; the largest is the fallback.
breakpoints = [1382, 992, 768, 480]

# Directory for generated derivatives, relative to the served root.
# Layout: <cache_path>/<breakpoint>/<filename>
cache_path = "ai-cache"

# Encoding quality (0 = worst, 100 = best). 0 is encoded as 1.
jpg_quality = 75

# Apply a light unsharp mask after downscaling.
sharpen = true

# Regenerate cached derivatives older than cache_period.
watch_cache = true

# Cache validity window in seconds (7 days).
cache_period = 604800

# Emit Cache-Control and Expires headers on adapted responses.
set_expiration_headers = true

# Cache-Control max-age is cache_period * 1000 (the historical magnitude).
# Set to false to emit cache_period seconds instead.
max_age_in_millis = true

# Image processor: "rust" (built in) or "magick" (external binary).
processor = "rust"

# With processor = "magick": run ImageMagick (`magick`) instead of
# GraphicsMagick (`gm convert`).
use_image_magick = false

# Compression algorithm: None, BZip, Fax, Group4, JPEG, Lossless, LZW, RLE,
# Zip or LZMA.
compression = "None"

# Log every adaptation decision at debug level.
debug = false

# Abort a resize that takes longer than this many seconds.
# generation_timeout_secs = 30
"##
}
