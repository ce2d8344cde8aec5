//! Hashing System - SHA-256 Fingerprints
//!
//! Provides deterministic, reproducible hashes so callers can tell whether a
//! previously composed image is still valid for a request.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

use chrono::{DateTime, Utc};

use crate::config::RenderConfig;
use crate::geometry::{PixelRect, ResolvedGeometry};
use crate::profile::Encoding;
use crate::templates::Template;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    to_string(&sort_keys(serde_json::to_value(value)?))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Digest over everything that must never change under a published id: the
/// template minus its name, price, enabled flag, sort order and timestamps.
pub fn geometry_digest(template: &Template) -> Result<String, serde_json::Error> {
    let mut frozen = template.clone();
    frozen.name = String::new();
    frozen.price = 0;
    frozen.is_enabled = true;
    frozen.sort_order = 0;
    frozen.created_at = DateTime::<Utc>::default();
    frozen.updated_at = DateTime::<Utc>::default();
    Ok(sha256_hex(canonical_json(&frozen)?.as_bytes()))
}

/// Non-geometric inputs that still change pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appearance {
    pub background: [u8; 4],
    pub placeholder: [u8; 4],
    pub finish_strength: f32,
    /// Content hashes of the background image and logo, in paint order.
    pub assets: Vec<String>,
}

impl Appearance {
    pub fn new(template: &Template, config: &RenderConfig, assets: Vec<String>) -> Self {
        Self {
            background: template.background_rgba(),
            placeholder: config.placeholder_rgba(),
            finish_strength: config.finish_strength,
            assets,
        }
    }
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    template_id: &'a str,
    width: u32,
    height: u32,
    slots: Vec<(&'a str, PixelRect, u32)>,
    logo: Option<PixelRect>,
    background: [u8; 4],
    placeholder: [u8; 4],
    assets: &'a [String],
    photos: &'a [String],
    finish: Option<f32>,
    encoding: &'a Encoding,
}

/// Content fingerprint of a render: resolved geometry in paint order,
/// appearance, ordered photo identities, finish and encoding.
pub fn compute_fingerprint(
    geometry: &ResolvedGeometry,
    appearance: &Appearance,
    photo_ids: &[String],
    finish: bool,
    encoding: &Encoding,
) -> Result<String, serde_json::Error> {
    let input = FingerprintInput {
        template_id: &geometry.template_id,
        width: geometry.width,
        height: geometry.height,
        slots: geometry
            .slots
            .iter()
            .map(|s| (s.slot_id.as_str(), s.rect, s.corner_radius))
            .collect(),
        logo: geometry.logo,
        background: appearance.background,
        placeholder: appearance.placeholder,
        assets: &appearance.assets,
        photos: photo_ids,
        // strength only matters when the gradient is drawn
        finish: finish.then_some(appearance.finish_strength),
        encoding,
    };
    Ok(sha256_hex(canonical_json(&input)?.as_bytes()))
}

mod hex {
    use std::fmt::Write;

    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let bytes = bytes.as_ref();
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(out, "{:02x}", b);
        }
        out
    }
}
