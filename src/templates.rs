//! Template System - Fixed Layout Catalog
//!
//! Templates are frozen once published. Geometry (canvas size, slot and logo
//! rectangles) never changes under an existing identifier; only metadata may.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::validation::TemplateValidator;

pub type TemplateId = String;

/// Z-order assumed for slots that do not declare one.
pub const DEFAULT_Z_ORDER: i32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    #[serde(rename = "4:6")]
    FourBySix,
    #[serde(rename = "2:3")]
    TwoByThree,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Widescreen,
}

impl AspectRatio {
    /// Width:height pair. Display sizing hint only; canvas pixels are authoritative.
    pub fn ratio(&self) -> (u32, u32) {
        match self {
            AspectRatio::FourBySix => (4, 6),
            AspectRatio::TwoByThree => (2, 3),
            AspectRatio::Square => (1, 1),
            AspectRatio::Widescreen => (16, 9),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::FourBySix => "4x6 Photo Print",
            AspectRatio::TwoByThree => "2x3 Wallet Size",
            AspectRatio::Square => "Square (Instagram)",
            AspectRatio::Widescreen => "Widescreen",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PreviewType {
    #[default]
    Grid,
    Strip,
    Collage,
}

/// A rectangle within a template, in percentages of the canvas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Corner radius in canvas pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

impl Slot {
    pub fn z_order(&self) -> i32 {
        self.z_index.unwrap_or(DEFAULT_Z_ORDER)
    }

    pub fn corner_radius(&self) -> f64 {
        self.radius.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogoOverlay {
    /// Asset reference resolved through an `AssetResolver`.
    pub url: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub still_count: u32,
    /// Price in whole rupees.
    pub price: u32,
    pub aspect_ratio: AspectRatio,
    /// Canvas size in pixels at the reference DPI.
    pub canvas_width: u32,
    pub canvas_height: u32,
    #[serde(default)]
    pub preview_type: PreviewType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<LogoOverlay>,
    pub slots: Vec<Slot>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_version")]
    pub template_version: String,
    #[serde(default = "default_version")]
    pub engine_min_version: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Metadata that may change on a published template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<u32>,
    #[serde(default)]
    pub is_enabled: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

impl Template {
    /// Digest over the fields that must never change once published.
    pub fn geometry_digest(&self) -> EngineResult<String> {
        Ok(crate::hashing::geometry_digest(self)?)
    }

    /// Copy of this template with the patch applied. Geometry is untouched.
    pub fn with_metadata(&self, patch: &MetadataPatch) -> Template {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = name.clone();
        }
        if let Some(price) = patch.price {
            next.price = price;
        }
        if let Some(enabled) = patch.is_enabled {
            next.is_enabled = enabled;
        }
        if let Some(order) = patch.sort_order {
            next.sort_order = order;
        }
        next.updated_at = Utc::now();
        next
    }

    pub fn background_rgba(&self) -> [u8; 4] {
        self.background_color
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or([255, 255, 255, 255])
    }
}

/// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 => Some([channel(0)?, channel(2)?, channel(4)?, 255]),
        8 => Some([channel(0)?, channel(2)?, channel(4)?, channel(6)?]),
        _ => None,
    }
}

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (
        "strip_2x6_2photos.json",
        include_str!("../templates/strip_2x6_2photos.json"),
    ),
    (
        "strip_2x6_4photos_duplicate.json",
        include_str!("../templates/strip_2x6_4photos_duplicate.json"),
    ),
    ("single_4x6.json", include_str!("../templates/single_4x6.json")),
    ("grid_4x6_2x2.json", include_str!("../templates/grid_4x6_2x2.json")),
];

/// Immutable, validated set of templates. Read-only after construction.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
    index: HashMap<TemplateId, usize>,
}

impl TemplateCatalog {
    /// Build a catalog, failing if any template is invalid.
    pub fn from_templates(templates: Vec<Template>) -> EngineResult<Self> {
        let validator = TemplateValidator::new();
        let mut index = HashMap::with_capacity(templates.len());

        for (i, template) in templates.iter().enumerate() {
            let report = validator.validate(template);
            if !report.valid {
                return Err(EngineError::invalid_template(&template.id, report.summary()));
            }
            if index.insert(template.id.clone(), i).is_some() {
                return Err(EngineError::invalid_template(
                    &template.id,
                    "duplicate template identifier",
                ));
            }
        }

        tracing::info!(templates = templates.len(), "template catalog constructed");
        Ok(Self { templates, index })
    }

    /// The fixed production catalog shipped with the engine.
    pub fn builtin() -> EngineResult<Self> {
        let templates = BUILTIN_TEMPLATES
            .iter()
            .map(|(source, json)| parse_template(source, json))
            .collect::<EngineResult<Vec<_>>>()?;
        Self::from_templates(templates)
    }

    /// Load every `*.json` file in `dir` as one template.
    pub fn load_from_dir(dir: &Path) -> EngineResult<Self> {
        let mut paths = vec![];
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut templates = Vec::with_capacity(paths.len());
        for path in &paths {
            let content = fs::read_to_string(path)?;
            let source = path.display().to_string();
            templates.push(parse_template(&source, &content)?);
        }
        Self::from_templates(templates)
    }

    /// Enabled templates by ascending sort order, optionally filtered by photo count.
    pub fn list_enabled(&self, still_count: Option<u32>) -> Vec<&Template> {
        let mut enabled: Vec<_> = self
            .templates
            .iter()
            .filter(|t| t.is_enabled)
            .filter(|t| still_count.map_or(true, |n| t.still_count == n))
            .collect();
        enabled.sort_by_key(|t| t.sort_order);
        enabled
    }

    /// Every template, disabled ones included, by ascending sort order.
    pub fn list_all(&self) -> Vec<&Template> {
        let mut all: Vec<_> = self.templates.iter().collect();
        all.sort_by_key(|t| t.sort_order);
        all
    }

    /// Lookup by identifier. Disabled templates remain resolvable for reprints.
    pub fn get_by_id(&self, id: &str) -> EngineResult<&Template> {
        self.index
            .get(id)
            .map(|&i| &self.templates[i])
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Fails if any template present in `previous` changed its geometry here.
    pub fn ensure_geometry_frozen(&self, previous: &TemplateCatalog) -> EngineResult<()> {
        for old in &previous.templates {
            if let Ok(current) = self.get_by_id(&old.id) {
                if current.geometry_digest()? != old.geometry_digest()? {
                    return Err(EngineError::invalid_template(
                        &old.id,
                        "geometry changed under a published identifier",
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self {
            templates: vec![],
            index: HashMap::new(),
        }
    }
}

fn parse_template(source: &str, json: &str) -> EngineResult<Template> {
    serde_json::from_str(json).map_err(|e| EngineError::invalid_template(source, e.to_string()))
}
