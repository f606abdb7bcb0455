use crate::data::assets;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_MIN_CONTRAST: f32 = 3.0;
pub const DEFAULT_MAX_SWATCHES: usize = 8;

const MAX_SWATCHES_LIMIT: usize = 256;
const MAX_TARGET_SIZE: u32 = 1024;
// WCAG contrast ratios span 1:1 to 21:1.
const CONTRAST_RANGE: std::ops::RangeInclusive<f32> = 1.0..=21.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum contrast against black for a swatch to be picked.
    pub min_contrast: f32,
    pub max_swatches: usize,
    /// Shorter side of the bitmap handed to the quantizer.
    pub target_size: u32,
    pub fetch_timeout_secs: u64,
    pub max_image_bytes: u64,
    pub user_agent: String,

    /// 0 disables coalescing in the background worker.
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_contrast: DEFAULT_MIN_CONTRAST,
            max_swatches: DEFAULT_MAX_SWATCHES,
            target_size: 128,
            fetch_timeout_secs: 8,
            max_image_bytes: 5 * 1024 * 1024,
            user_agent: concat!("cover-accent/", env!("CARGO_PKG_VERSION")).to_string(),
            debounce_ms: 0,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&assets::resolve_config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        match toml::from_str::<Self>(&raw) {
            Ok(cfg) => Ok(cfg.validated()),
            Err(e) => {
                log::warn!("ignoring invalid config {}: {e}", path.display());
                Ok(Self::default())
            }
        }
    }

    /// Replaces out-of-range fields with their defaults, logging each one.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if !CONTRAST_RANGE.contains(&self.min_contrast) {
            log::warn!("min_contrast {} outside 1..=21; using {}", self.min_contrast, defaults.min_contrast);
            self.min_contrast = defaults.min_contrast;
        }
        if self.max_swatches == 0 || self.max_swatches > MAX_SWATCHES_LIMIT {
            log::warn!("max_swatches {} outside 1..={MAX_SWATCHES_LIMIT}; using {}", self.max_swatches, defaults.max_swatches);
            self.max_swatches = defaults.max_swatches;
        }
        if self.target_size == 0 || self.target_size > MAX_TARGET_SIZE {
            log::warn!("target_size {} outside 1..={MAX_TARGET_SIZE}; using {}", self.target_size, defaults.target_size);
            self.target_size = defaults.target_size;
        }
        if self.fetch_timeout_secs == 0 {
            log::warn!("fetch_timeout_secs must be positive; using {}", defaults.fetch_timeout_secs);
            self.fetch_timeout_secs = defaults.fetch_timeout_secs;
        }
        if self.max_image_bytes == 0 {
            log::warn!("max_image_bytes must be positive; using {}", defaults.max_image_bytes);
            self.max_image_bytes = defaults.max_image_bytes;
        }
        if self.user_agent.trim().is_empty() {
            self.user_agent = defaults.user_agent;
        }

        self
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("mkdir {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self)?;
        fs::write(path, raw).with_context(|| format!("write {}", path.display()))
    }
}
