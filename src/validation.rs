//! Template Validation - Rule/Policy Separation
//!
//! Rules produce structured violations.
//! Policy: any error-severity violation rejects the template; warnings are
//! recorded and logged but never block catalog construction.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::templates::{parse_hex_color, Template};
use crate::ENGINE_VERSION;

/// Slack allowed on percentage sums such as `x + width <= 100`.
const PERCENT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    #[serde(default)]
    pub slot_id: Option<String>,
}

impl TemplateViolation {
    fn error(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            severity: ViolationSeverity::Error,
            message: message.into(),
            slot_id: None,
        }
    }

    fn slot_error(rule: &str, slot_id: &str, message: impl Into<String>) -> Self {
        Self {
            slot_id: Some(slot_id.to_string()),
            ..Self::error(rule, message)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub template_id: String,
    pub violations: Vec<TemplateViolation>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &TemplateViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Error)
    }

    /// Error messages joined for an `InvalidTemplate` reason.
    pub fn summary(&self) -> String {
        self.errors()
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validation rule trait - produces violations
pub trait TemplateRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, template: &Template) -> Vec<TemplateViolation>;
}

// --- Concrete Rules ---

pub struct CanvasRule;

impl TemplateRule for CanvasRule {
    fn name(&self) -> &'static str { "canvas" }

    fn check(&self, template: &Template) -> Vec<TemplateViolation> {
        if template.canvas_width == 0 || template.canvas_height == 0 {
            return vec![TemplateViolation::error(
                self.name(),
                format!(
                    "canvas must be positive, got {}x{}",
                    template.canvas_width, template.canvas_height
                ),
            )];
        }
        vec![]
    }
}

pub struct SlotCountRule;

impl TemplateRule for SlotCountRule {
    fn name(&self) -> &'static str { "slot_count" }

    fn check(&self, template: &Template) -> Vec<TemplateViolation> {
        if template.slots.len() != template.still_count as usize {
            return vec![TemplateViolation::error(
                self.name(),
                format!(
                    "stillCount is {} but {} slots are declared",
                    template.still_count,
                    template.slots.len()
                ),
            )];
        }
        vec![]
    }
}

pub struct SlotBoundsRule;

impl TemplateRule for SlotBoundsRule {
    fn name(&self) -> &'static str { "slot_bounds" }

    fn check(&self, template: &Template) -> Vec<TemplateViolation> {
        template
            .slots
            .iter()
            .filter_map(|slot| {
                rect_problem(slot.x, slot.y, slot.width, slot.height)
                    .map(|problem| TemplateViolation::slot_error(self.name(), &slot.id, problem))
            })
            .collect()
    }
}

pub struct SlotIdRule;

impl TemplateRule for SlotIdRule {
    fn name(&self) -> &'static str { "slot_ids" }

    fn check(&self, template: &Template) -> Vec<TemplateViolation> {
        let mut seen = HashSet::new();
        let mut violations = vec![];

        for slot in &template.slots {
            if slot.id.trim().is_empty() {
                violations.push(TemplateViolation::error(self.name(), "slot with empty id"));
            } else if !seen.insert(slot.id.as_str()) {
                violations.push(TemplateViolation::slot_error(
                    self.name(),
                    &slot.id,
                    format!("duplicate slot id {}", slot.id),
                ));
            }
        }

        violations
    }
}

pub struct CornerRadiusRule;

impl TemplateRule for CornerRadiusRule {
    fn name(&self) -> &'static str { "corner_radius" }

    fn check(&self, template: &Template) -> Vec<TemplateViolation> {
        template
            .slots
            .iter()
            .filter(|slot| {
                let r = slot.corner_radius();
                !r.is_finite() || r < 0.0
            })
            .map(|slot| {
                TemplateViolation::slot_error(
                    self.name(),
                    &slot.id,
                    format!("radius must be a non-negative number, got {}", slot.corner_radius()),
                )
            })
            .collect()
    }
}

pub struct OverlayRule;

impl TemplateRule for OverlayRule {
    fn name(&self) -> &'static str { "overlay" }

    fn check(&self, template: &Template) -> Vec<TemplateViolation> {
        let mut violations = vec![];

        if let Some(logo) = &template.logo {
            if logo.url.trim().is_empty() {
                violations.push(TemplateViolation::error(
                    self.name(),
                    "logo without asset reference",
                ));
            }
            if let Some(problem) = rect_problem(logo.x, logo.y, logo.width, logo.height) {
                violations.push(TemplateViolation::error(self.name(), format!("logo {}", problem)));
            }
        }

        if let Some(color) = &template.background_color {
            if parse_hex_color(color).is_none() {
                violations.push(TemplateViolation::error(
                    self.name(),
                    format!("unparseable background color {}", color),
                ));
            }
        }

        violations
    }
}

pub struct VersionRule;

impl TemplateRule for VersionRule {
    fn name(&self) -> &'static str { "version" }

    fn check(&self, template: &Template) -> Vec<TemplateViolation> {
        let mut violations = vec![];

        if semver::Version::parse(&template.template_version).is_err() {
            violations.push(TemplateViolation::error(
                self.name(),
                format!("invalid template version {}", template.template_version),
            ));
        }

        match (
            semver::Version::parse(ENGINE_VERSION),
            semver::Version::parse(&template.engine_min_version),
        ) {
            (Ok(engine), Ok(min)) if engine < min => {
                violations.push(TemplateViolation::error(
                    self.name(),
                    format!("requires engine >= {}, current is {}", min, engine),
                ));
            }
            (_, Err(_)) => {
                violations.push(TemplateViolation::error(
                    self.name(),
                    format!("invalid engine min version {}", template.engine_min_version),
                ));
            }
            _ => {}
        }

        violations
    }
}

/// Tag/canvas disagreement is a display concern only, so it never blocks.
pub struct AspectRatioRule;

impl TemplateRule for AspectRatioRule {
    fn name(&self) -> &'static str { "aspect_ratio" }

    fn check(&self, template: &Template) -> Vec<TemplateViolation> {
        if template.canvas_height == 0 {
            return vec![];
        }

        let (w, h) = template.aspect_ratio.ratio();
        let expected = w as f64 / h as f64;
        let actual = template.canvas_width as f64 / template.canvas_height as f64;

        if (expected - actual).abs() > 0.01 {
            vec![TemplateViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Warning,
                message: format!("canvas ratio {:.3} does not match tag {}:{}", actual, w, h),
                slot_id: None,
            }]
        } else {
            vec![]
        }
    }
}

fn rect_problem(x: f64, y: f64, width: f64, height: f64) -> Option<String> {
    if ![x, y, width, height].iter().all(|v| v.is_finite()) {
        return Some("has non-finite geometry".to_string());
    }
    if x < 0.0 || y < 0.0 {
        return Some(format!("origin ({}, {}) is negative", x, y));
    }
    if width <= 0.0 || height <= 0.0 {
        return Some(format!("size {}x{} must be positive", width, height));
    }
    if x + width > 100.0 + PERCENT_EPSILON {
        return Some(format!("x + width = {} exceeds 100", x + width));
    }
    if y + height > 100.0 + PERCENT_EPSILON {
        return Some(format!("y + height = {} exceeds 100", y + height));
    }
    None
}

/// Validator orchestrates rules and applies policy
pub struct TemplateValidator {
    rules: Vec<Box<dyn TemplateRule>>,
}

impl TemplateValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(CanvasRule),
                Box::new(SlotCountRule),
                Box::new(SlotBoundsRule),
                Box::new(SlotIdRule),
                Box::new(CornerRadiusRule),
                Box::new(OverlayRule),
                Box::new(VersionRule),
                Box::new(AspectRatioRule),
            ],
        }
    }

    pub fn validate(&self, template: &Template) -> ValidationReport {
        let violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.check(template))
            .collect();

        for warning in violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Warning)
        {
            tracing::warn!(template = %template.id, rule = %warning.rule, "{}", warning.message);
        }

        let valid = !violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Error);

        ValidationReport {
            valid,
            template_id: template.id.clone(),
            violations,
        }
    }
}

impl Default for TemplateValidator {
    fn default() -> Self {
        Self::new()
    }
}
