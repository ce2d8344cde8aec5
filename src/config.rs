//! Render configuration
//!
//! Defaults match the production kiosk: 300 DPI authored canvases, a 100 DPI
//! on-screen preview and a 150 DPI shareable export.

use serde::Deserialize;
use std::path::Path;

use crate::templates::parse_hex_color;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// DPI at which template canvas sizes are authored.
    pub reference_dpi: u32,
    pub preview_dpi: u32,
    pub export_dpi: u32,
    /// Lossy quality used by the export preset, 0-1.
    pub export_quality: f32,
    /// Fill for slots rendered without a photo.
    pub placeholder_color: String,
    /// Peak alpha of the finish gradient.
    pub finish_strength: f32,
    /// Largest canvas, in pixels, a single render may allocate.
    pub max_pixels: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            reference_dpi: 300,
            preview_dpi: 100,
            export_dpi: 150,
            export_quality: 0.95,
            placeholder_color: "#e5e7eb".to_string(),
            finish_strength: 0.025,
            max_pixels: 64_000_000,
        }
    }
}

impl RenderConfig {
    /// Defaults overridden by `PHOTOGRID_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            reference_dpi: env_parse("PHOTOGRID_REFERENCE_DPI", defaults.reference_dpi)?,
            preview_dpi: env_parse("PHOTOGRID_PREVIEW_DPI", defaults.preview_dpi)?,
            export_dpi: env_parse("PHOTOGRID_EXPORT_DPI", defaults.export_dpi)?,
            export_quality: env_parse("PHOTOGRID_EXPORT_QUALITY", defaults.export_quality)?,
            placeholder_color: std::env::var("PHOTOGRID_PLACEHOLDER_COLOR")
                .unwrap_or(defaults.placeholder_color),
            finish_strength: env_parse("PHOTOGRID_FINISH_STRENGTH", defaults.finish_strength)?,
            max_pixels: env_parse("PHOTOGRID_MAX_PIXELS", defaults.max_pixels)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, dpi) in [
            ("referenceDpi", self.reference_dpi),
            ("previewDpi", self.preview_dpi),
            ("exportDpi", self.export_dpi),
        ] {
            if dpi == 0 {
                return Err(ConfigError::InvalidDpi(name));
            }
        }
        if !(0.0..=1.0).contains(&self.export_quality) {
            return Err(ConfigError::InvalidQuality(self.export_quality));
        }
        if !(0.0..=1.0).contains(&self.finish_strength) {
            return Err(ConfigError::InvalidFinishStrength(self.finish_strength));
        }
        if self.max_pixels == 0 {
            return Err(ConfigError::InvalidPixelLimit);
        }
        if parse_hex_color(&self.placeholder_color).is_none() {
            return Err(ConfigError::InvalidColor(self.placeholder_color.clone()));
        }
        Ok(())
    }

    pub(crate) fn placeholder_rgba(&self) -> [u8; 4] {
        parse_hex_color(&self.placeholder_color).unwrap_or([229, 231, 235, 255])
    }
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("{0} must be positive")]
    InvalidDpi(&'static str),

    #[error("Export quality must be between 0 and 1, got {0}")]
    InvalidQuality(f32),

    #[error("Finish strength must be between 0 and 1, got {0}")]
    InvalidFinishStrength(f32),

    #[error("maxPixels must be positive")]
    InvalidPixelLimit,

    #[error("Invalid placeholder color: {0}")]
    InvalidColor(String),

    #[error("Failed to read config {path}: {reason}")]
    Unreadable { path: String, reason: String },
}
