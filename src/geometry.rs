//! Geometry Resolver
//!
//! Pure conversion from a template's percentage layout to pixel rectangles at
//! a target resolution. Slots come out in paint order: ascending z-order, ties
//! kept in declaration order.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::templates::{Template, TemplateId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSlot {
    pub slot_id: String,
    /// Position of the slot in the template's declaration list.
    pub declaration_index: usize,
    pub rect: PixelRect,
    pub corner_radius: u32,
    pub z_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedGeometry {
    pub template_id: TemplateId,
    pub width: u32,
    pub height: u32,
    /// Target width over canvas width; scales absolute-pixel template values.
    pub scale: f64,
    pub background: PixelRect,
    pub logo: Option<PixelRect>,
    /// Paint order. The i-th photo fills `slots[i]`.
    pub slots: Vec<ResolvedSlot>,
}

impl ResolvedGeometry {
    pub fn slot(&self, slot_id: &str) -> Option<&ResolvedSlot> {
        self.slots.iter().find(|s| s.slot_id == slot_id)
    }
}

/// Resolve `template` for a `width` x `height` target.
pub fn resolve(template: &Template, width: u32, height: u32) -> EngineResult<ResolvedGeometry> {
    if width == 0 || height == 0 {
        return Err(EngineError::InvalidTarget(format!(
            "target must be positive, got {}x{}",
            width, height
        )));
    }
    if template.canvas_width == 0 {
        return Err(EngineError::invalid_template(&template.id, "zero canvas width"));
    }

    let scale = width as f64 / template.canvas_width as f64;

    let mut slots: Vec<ResolvedSlot> = template
        .slots
        .iter()
        .enumerate()
        .map(|(i, slot)| ResolvedSlot {
            slot_id: slot.id.clone(),
            declaration_index: i,
            rect: percent_rect(slot.x, slot.y, slot.width, slot.height, width, height),
            corner_radius: (slot.corner_radius() * scale).round().max(0.0) as u32,
            z_order: slot.z_order(),
        })
        .collect();
    // stable: equal z-orders keep declaration order
    slots.sort_by_key(|s| s.z_order);

    let logo = template
        .logo
        .as_ref()
        .map(|l| percent_rect(l.x, l.y, l.width, l.height, width, height));

    tracing::debug!(
        template = %template.id,
        width,
        height,
        slots = slots.len(),
        "resolved geometry"
    );

    Ok(ResolvedGeometry {
        template_id: template.id.clone(),
        width,
        height,
        scale,
        background: PixelRect { x: 0, y: 0, width, height },
        logo,
        slots,
    })
}

fn percent_rect(x: f64, y: f64, w: f64, h: f64, target_w: u32, target_h: u32) -> PixelRect {
    let (px, pw) = percent_span(x, w, target_w);
    let (py, ph) = percent_span(y, h, target_h);
    PixelRect { x: px, y: py, width: pw, height: ph }
}

/// Origin and length rounded independently, then clamped inside `extent`.
fn percent_span(origin: f64, length: f64, extent: u32) -> (u32, u32) {
    let to_px = |pct: f64| (pct / 100.0 * extent as f64).round().clamp(0.0, extent as f64) as u32;
    let start = to_px(origin);
    let len = to_px(length).min(extent - start);
    (start, len)
}
