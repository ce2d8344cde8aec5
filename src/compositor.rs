//! Compositor - Layered Rendering
//!
//! Paint order, bottom to top:
//! 1. background (solid colour, then background image cover-fit)
//! 2. slots in resolved paint order, clipped to their rounded rectangles
//! 3. logo, contain-fit inside its rectangle
//! 4. finish gradient, only when requested
//!
//! Photos map to slots by position. A photo that is missing or undecodable
//! becomes a neutral placeholder panel and a diagnostic, never an error.

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::assets::{decode_image, AssetError, AssetResolver, PhotoAsset};
use crate::config::RenderConfig;
use crate::error::{EngineError, EngineResult};
use crate::geometry::{PixelRect, ResolvedGeometry};
use crate::hashing::sha256_hex;
use crate::profile::check_pixel_limit;
use crate::templates::Template;

const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderReason {
    /// No photo was supplied for the slot.
    Missing,
    /// The supplied photo could not be decoded.
    Undecodable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDiagnostic {
    pub slot_id: String,
    pub reason: PlaceholderReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Composition {
    pub image: RgbaImage,
    pub diagnostics: Vec<SlotDiagnostic>,
    /// SHA-256 of the background image and logo bytes actually drawn.
    pub asset_digests: Vec<String>,
}

pub struct Compositor<'a> {
    assets: &'a dyn AssetResolver,
    config: &'a RenderConfig,
}

impl<'a> Compositor<'a> {
    pub fn new(assets: &'a dyn AssetResolver, config: &'a RenderConfig) -> Self {
        Self { assets, config }
    }

    pub fn compose(
        &self,
        template: &Template,
        geometry: &ResolvedGeometry,
        photos: &[PhotoAsset],
        finish: bool,
    ) -> EngineResult<Composition> {
        check_pixel_limit(geometry.width, geometry.height, self.config)?;

        // Required assets first: a broken background or logo aborts before any drawing.
        let background = template
            .background_image
            .as_deref()
            .map(|reference| self.load_required(reference, "background"))
            .transpose()?;
        let logo = template
            .logo
            .as_ref()
            .map(|logo| self.load_required(&logo.url, "logo"))
            .transpose()?;

        let mut canvas =
            RgbaImage::from_pixel(geometry.width, geometry.height, Rgba([255, 255, 255, 255]));
        let base = template.background_rgba();
        paint_rect(&mut canvas, geometry.background, 0, |_, _| base);

        let mut asset_digests = vec![];
        if let Some((bg, digest)) = background {
            asset_digests.push(digest);
            let cover = cover_fit(&bg, geometry.background);
            paint_rect(&mut canvas, geometry.background, 0, |x, y| cover.get_pixel(x, y).0);
        }

        let placeholder = self.config.placeholder_rgba();
        let mut diagnostics = vec![];

        for (i, slot) in geometry.slots.iter().enumerate() {
            let decoded = match photos.get(i) {
                Some(photo) => photo
                    .decode()
                    .map_err(|e| (PlaceholderReason::Undecodable, Some(e.to_string()))),
                None => Err((PlaceholderReason::Missing, None)),
            };

            match decoded {
                Ok(img) => {
                    if slot.rect.is_empty() {
                        continue;
                    }
                    let cover = cover_fit(&img, slot.rect);
                    paint_rect(&mut canvas, slot.rect, slot.corner_radius, |x, y| {
                        cover.get_pixel(x, y).0
                    });
                }
                Err((reason, detail)) => {
                    tracing::warn!(
                        template = %template.id,
                        slot = %slot.slot_id,
                        ?reason,
                        "rendering placeholder"
                    );
                    paint_rect(&mut canvas, slot.rect, slot.corner_radius, |_, _| placeholder);
                    diagnostics.push(SlotDiagnostic {
                        slot_id: slot.slot_id.clone(),
                        reason,
                        detail,
                    });
                }
            }
        }

        if let (Some((img, digest)), Some(rect)) = (logo, geometry.logo) {
            asset_digests.push(digest);
            draw_contained(&mut canvas, &img, rect);
        }

        if finish {
            apply_finish(&mut canvas, self.config.finish_strength);
        }

        Ok(Composition {
            image: canvas,
            diagnostics,
            asset_digests,
        })
    }

    /// Decoded image plus the SHA-256 of its source bytes.
    fn load_required(
        &self,
        reference: &str,
        role: &str,
    ) -> EngineResult<(DynamicImage, String)> {
        let failed = |e: AssetError| {
            EngineError::CompositionFailed(format!("{} {}: {}", role, reference, e))
        };
        let bytes = self.assets.load(reference).map_err(failed)?;
        let img = decode_image(&bytes).map_err(failed)?;
        Ok((img, sha256_hex(&bytes)))
    }
}

/// Scale to cover `rect` preserving aspect ratio, cropping overflow around the centre.
fn cover_fit(img: &DynamicImage, rect: PixelRect) -> RgbaImage {
    if rect.is_empty() {
        return RgbaImage::new(0, 0);
    }
    img.resize_to_fill(rect.width, rect.height, RESAMPLE_FILTER)
        .to_rgba8()
}

/// Scale to fit inside `rect` preserving aspect ratio, centred.
fn draw_contained(canvas: &mut RgbaImage, img: &DynamicImage, rect: PixelRect) {
    if rect.is_empty() {
        return;
    }
    let fitted = img.resize(rect.width, rect.height, RESAMPLE_FILTER).to_rgba8();
    let (w, h) = fitted.dimensions();
    let inner = PixelRect {
        x: rect.x + (rect.width - w.min(rect.width)) / 2,
        y: rect.y + (rect.height - h.min(rect.height)) / 2,
        width: w.min(rect.width),
        height: h.min(rect.height),
    };
    paint_rect(canvas, inner, 0, |x, y| fitted.get_pixel(x, y).0);
}

/// Blend `source(x, y)` (rect-local coordinates) over the canvas inside `rect`,
/// clipped to a rounded rectangle of `radius` pixels.
fn paint_rect<F>(canvas: &mut RgbaImage, rect: PixelRect, radius: u32, source: F)
where
    F: Fn(u32, u32) -> [u8; 4],
{
    let right = rect.right().min(canvas.width());
    let bottom = rect.bottom().min(canvas.height());
    for cy in rect.y..bottom {
        for cx in rect.x..right {
            let (lx, ly) = (cx - rect.x, cy - rect.y);
            let coverage = corner_coverage(lx, ly, rect.width, rect.height, radius);
            if coverage == 0 {
                continue;
            }
            let dst = canvas.get_pixel_mut(cx, cy);
            *dst = Rgba(over(dst.0, source(lx, ly), coverage));
        }
    }
}

/// Coverage 0-255 of pixel (x, y) inside a w x h rounded rectangle.
fn corner_coverage(x: u32, y: u32, w: u32, h: u32, radius: u32) -> u8 {
    if radius == 0 {
        return 255;
    }
    let r = (radius as f32).min(w as f32 / 2.0).min(h as f32 / 2.0);
    let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
    let dx = fx - fx.clamp(r, w as f32 - r);
    let dy = fy - fy.clamp(r, h as f32 - r);
    if dx == 0.0 || dy == 0.0 {
        return 255;
    }
    let dist = (dx * dx + dy * dy).sqrt();
    ((r - dist + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Straight-alpha source over an opaque destination.
fn over(dst: [u8; 4], src: [u8; 4], coverage: u8) -> [u8; 4] {
    let a = mul_div255(u16::from(src[3]), u16::from(coverage));
    if a == 0 {
        return dst;
    }
    let inv = 255 - u16::from(a);
    let mut out = [0u8, 0, 0, 255];
    for i in 0..3 {
        out[i] = mul_div255(u16::from(src[i]), u16::from(a))
            .saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// White diagonal sheen, strongest bottom-left, fading out towards top-right.
fn apply_finish(canvas: &mut RgbaImage, strength: f32) {
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    for (x, y, px) in canvas.enumerate_pixels_mut() {
        let u = ((x as f32 + 0.5) / w as f32 + 1.0 - (y as f32 + 0.5) / h as f32) / 2.0;
        let alpha = (strength * (1.0 - u) * 255.0).round().clamp(0.0, 255.0) as u8;
        *px = Rgba(over(px.0, [255, 255, 255, alpha], 255));
    }
}
