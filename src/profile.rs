//! Target Profiles
//!
//! A profile names one rendering destination. Named presets derive their pixel
//! size from the template canvas and a DPI, so preview, print and export stay
//! proportional to the same authored layout.

use serde::{Deserialize, Serialize};

use crate::config::RenderConfig;
use crate::error::{EngineError, EngineResult};
use crate::templates::Template;

pub const DEFAULT_QUALITY: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DpiPreset {
    Screen,
    PrintDraft,
    PrintStandard,
    PrintHigh,
}

impl DpiPreset {
    pub fn dpi(&self) -> u32 {
        match self {
            DpiPreset::Screen => 72,
            DpiPreset::PrintDraft => 150,
            DpiPreset::PrintStandard => 300,
            DpiPreset::PrintHigh => 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// On-screen preview.
    Preview,
    /// Print-resolution output at the reference DPI.
    Print,
    /// Shareable digital copy.
    Export,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum Encoding {
    /// Unencoded RGBA8, row-major.
    Raw,
    Png,
    Jpeg {
        /// 0-1
        quality: f32,
    },
}

impl Encoding {
    pub fn jpeg() -> Self {
        Encoding::Jpeg { quality: DEFAULT_QUALITY }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Encoding::Raw => "rgba",
            Encoding::Png => "png",
            Encoding::Jpeg { .. } => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Encoding::Raw => "application/octet-stream",
            Encoding::Png => "image/png",
            Encoding::Jpeg { .. } => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetSize {
    Preset { preset: Preset },
    Dpi { dpi: u32 },
    Explicit { width: u32, height: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub size: TargetSize,
    pub encoding: Encoding,
    /// Draw the finish gradient last. Never applied implicitly.
    #[serde(default)]
    pub finish: bool,
}

impl TargetProfile {
    /// Named preset with its conventional encoding.
    pub fn preset(preset: Preset, config: &RenderConfig) -> Self {
        let encoding = match preset {
            Preset::Preview => Encoding::Raw,
            Preset::Print => Encoding::Png,
            Preset::Export => Encoding::Jpeg { quality: config.export_quality },
        };
        Self {
            size: TargetSize::Preset { preset },
            encoding,
            finish: false,
        }
    }

    /// Preview preset. Sizes still come from the rendering emitter's config.
    pub fn preview() -> Self {
        Self::preset(Preset::Preview, &RenderConfig::default())
    }

    pub fn print() -> Self {
        Self::preset(Preset::Print, &RenderConfig::default())
    }

    /// Export preset at the default quality. Use `OutputEmitter::profile` to
    /// pick up a configured `export_quality`.
    pub fn export() -> Self {
        Self::preset(Preset::Export, &RenderConfig::default())
    }

    pub fn explicit(width: u32, height: u32, encoding: Encoding) -> Self {
        Self {
            size: TargetSize::Explicit { width, height },
            encoding,
            finish: false,
        }
    }

    pub fn at_dpi(dpi: u32, encoding: Encoding) -> Self {
        Self {
            size: TargetSize::Dpi { dpi },
            encoding,
            finish: false,
        }
    }

    pub fn with_finish(mut self, finish: bool) -> Self {
        self.finish = finish;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Pixel size for `template`, validating the profile.
    pub fn dimensions(
        &self,
        template: &Template,
        config: &RenderConfig,
    ) -> EngineResult<(u32, u32)> {
        if let Encoding::Jpeg { quality } = self.encoding {
            if !(0.0..=1.0).contains(&quality) {
                return Err(EngineError::InvalidTarget(format!(
                    "quality must be between 0 and 1, got {}",
                    quality
                )));
            }
        }

        let (width, height) = match self.size {
            TargetSize::Explicit { width, height } => (width, height),
            TargetSize::Dpi { dpi } => scale_canvas(template, dpi, config.reference_dpi),
            TargetSize::Preset { preset } => {
                let dpi = match preset {
                    Preset::Preview => config.preview_dpi,
                    Preset::Print => config.reference_dpi,
                    Preset::Export => config.export_dpi,
                };
                scale_canvas(template, dpi, config.reference_dpi)
            }
        };

        if width == 0 || height == 0 {
            return Err(EngineError::InvalidTarget(format!(
                "target must be positive, got {}x{}",
                width, height
            )));
        }
        check_pixel_limit(width, height, config)?;
        Ok((width, height))
    }
}

/// Rejects canvases larger than `config.max_pixels` before anything is allocated.
pub(crate) fn check_pixel_limit(
    width: u32,
    height: u32,
    config: &RenderConfig,
) -> EngineResult<()> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels > config.max_pixels {
        return Err(EngineError::InvalidTarget(format!(
            "{}x{} exceeds the {} pixel limit",
            width, height, config.max_pixels
        )));
    }
    Ok(())
}

fn scale_canvas(template: &Template, dpi: u32, reference_dpi: u32) -> (u32, u32) {
    if reference_dpi == 0 {
        return (0, 0);
    }
    let factor = dpi as f64 / reference_dpi as f64;
    (
        (template.canvas_width as f64 * factor).round() as u32,
        (template.canvas_height as f64 * factor).round() as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateCatalog;

    fn single() -> Template {
        TemplateCatalog::builtin()
            .unwrap()
            .get_by_id("single_4x6")
            .unwrap()
            .clone()
    }

    #[test]
    fn test_preset_dimensions() {
        let config = RenderConfig::default();
        let template = single();
        assert_eq!(TargetProfile::preview().dimensions(&template, &config).unwrap(), (400, 600));
        assert_eq!(TargetProfile::print().dimensions(&template, &config).unwrap(), (1200, 1800));
        assert_eq!(TargetProfile::export().dimensions(&template, &config).unwrap(), (600, 900));
    }

    #[test]
    fn test_dpi_presets() {
        let config = RenderConfig::default();
        let profile = TargetProfile::at_dpi(DpiPreset::PrintHigh.dpi(), Encoding::Png);
        assert_eq!(profile.dimensions(&single(), &config).unwrap(), (2400, 3600));
        assert_eq!(DpiPreset::Screen.dpi(), 72);
    }

    #[test]
    fn test_invalid_profiles() {
        let config = RenderConfig::default();
        let template = single();

        let zero = TargetProfile::explicit(0, 10, Encoding::Raw);
        assert!(matches!(zero.dimensions(&template, &config), Err(EngineError::InvalidTarget(_))));

        let tiny_dpi = TargetProfile::at_dpi(0, Encoding::Raw);
        assert!(matches!(
            tiny_dpi.dimensions(&template, &config),
            Err(EngineError::InvalidTarget(_))
        ));

        let bad_quality = TargetProfile::explicit(10, 10, Encoding::Jpeg { quality: 1.5 });
        assert!(matches!(
            bad_quality.dimensions(&template, &config),
            Err(EngineError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_oversized_target_is_invalid() {
        let config = RenderConfig::default();
        let template = single();

        let huge = TargetProfile::explicit(u32::MAX, u32::MAX, Encoding::Raw);
        assert!(matches!(huge.dimensions(&template, &config), Err(EngineError::InvalidTarget(_))));

        let huge_dpi = TargetProfile::at_dpi(1_000_000, Encoding::Png);
        assert!(matches!(
            huge_dpi.dimensions(&template, &config),
            Err(EngineError::InvalidTarget(_))
        ));

        let tight = RenderConfig {
            max_pixels: 100 * 150,
            ..Default::default()
        };
        let at_limit = TargetProfile::explicit(100, 150, Encoding::Raw);
        assert_eq!(at_limit.dimensions(&template, &tight).unwrap(), (100, 150));
        let over = TargetProfile::explicit(100, 151, Encoding::Raw);
        assert!(over.dimensions(&template, &tight).is_err());
    }

    #[test]
    fn test_export_uses_configured_quality() {
        let config = RenderConfig {
            export_quality: 0.7,
            ..Default::default()
        };
        let profile = TargetProfile::preset(Preset::Export, &config);
        assert_eq!(profile.encoding, Encoding::Jpeg { quality: 0.7 });
        assert!(!profile.finish);
    }
}
