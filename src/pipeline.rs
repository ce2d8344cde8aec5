//! Output Emitter - Single Entry Point
//!
//! Every render goes through `render`: lookup, resolve once, composite, encode.
//! Preview, print and export differ only in target size and encoding, never in
//! slot assignment or crop decisions.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use uuid::Uuid;

use crate::assets::{AssetResolver, InlineAssets, PhotoAsset};
use crate::compositor::{Compositor, PlaceholderReason, SlotDiagnostic};
use crate::config::RenderConfig;
use crate::error::{EngineError, EngineResult};
use crate::geometry::{resolve, ResolvedGeometry};
use crate::hashing::{compute_fingerprint, Appearance};
use crate::profile::{Encoding, Preset, TargetProfile};
use crate::templates::{Template, TemplateCatalog};
use crate::ENGINE_VERSION;

/// The output artifact of one render call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedImage {
    pub id: String,
    pub template_id: String,
    pub template_version: String,
    pub engine_version: String,
    pub rendered_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub encoding: Encoding,
    /// Content-derived; equal fingerprints mean identical output.
    pub fingerprint: String,
    /// Slots rendered as placeholders.
    pub diagnostics: Vec<SlotDiagnostic>,
    /// RGBA8 pixels for `Encoding::Raw`, encoded file bytes otherwise.
    #[serde(skip)]
    pub data: Vec<u8>,
    pub geometry: ResolvedGeometry,
}

impl ComposedImage {
    pub fn placeholder_slots(&self) -> Vec<&str> {
        self.diagnostics.iter().map(|d| d.slot_id.as_str()).collect()
    }

    pub fn has_placeholders(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn missing_slots(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.reason == PlaceholderReason::Missing)
            .count()
    }

    pub fn data_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Pixel buffer view; only available for raw renders.
    pub fn to_rgba(&self) -> Option<RgbaImage> {
        match self.encoding {
            Encoding::Raw => RgbaImage::from_raw(self.width, self.height, self.data.clone()),
            _ => None,
        }
    }
}

/// Preview, print and export of one session.
#[derive(Debug, Clone)]
pub struct RenderSet {
    pub preview: ComposedImage,
    pub print: ComposedImage,
    pub export: ComposedImage,
}

/// The output emitter - single entry point for all render operations
pub struct OutputEmitter {
    catalog: TemplateCatalog,
    assets: Box<dyn AssetResolver>,
    config: RenderConfig,
}

impl OutputEmitter {
    pub fn new(catalog: TemplateCatalog) -> Self {
        Self {
            catalog,
            assets: Box::new(InlineAssets::new()),
            config: RenderConfig::default(),
        }
    }

    pub fn with_assets(mut self, assets: impl AssetResolver + 'static) -> Self {
        self.assets = Box::new(assets);
        self
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Named preset built from this emitter's config, so the export preset
    /// carries the configured `export_quality`.
    pub fn profile(&self, preset: Preset) -> TargetProfile {
        TargetProfile::preset(preset, &self.config)
    }

    /// Resolve geometry for a template without compositing.
    pub fn resolve(
        &self,
        template_id: &str,
        profile: &TargetProfile,
    ) -> EngineResult<ResolvedGeometry> {
        let template = self.catalog.get_by_id(template_id)?;
        let (width, height) = profile.dimensions(template, &self.config)?;
        resolve(template, width, height)
    }

    /// Render `photos` into `template_id` for one target profile.
    #[tracing::instrument(skip(self, photos), fields(photos = photos.len()))]
    pub fn render(
        &self,
        template_id: &str,
        photos: &[PhotoAsset],
        profile: &TargetProfile,
    ) -> EngineResult<ComposedImage> {
        let template = self.catalog.get_by_id(template_id)?;
        self.render_template(template, photos, profile)
    }

    /// Render preview, print and export concurrently from one template lookup.
    pub fn render_set(
        &self,
        template_id: &str,
        photos: &[PhotoAsset],
        finish: bool,
    ) -> EngineResult<RenderSet> {
        let template = self.catalog.get_by_id(template_id)?;
        let render = |preset: Preset| {
            self.render_template(template, photos, &self.profile(preset).with_finish(finish))
        };

        let (preview, print, export) = std::thread::scope(|s| {
            let preview = s.spawn(|| render(Preset::Preview));
            let print = s.spawn(|| render(Preset::Print));
            let export = render(Preset::Export);
            (join(preview), join(print), export)
        });

        Ok(RenderSet {
            preview: preview?,
            print: print?,
            export: export?,
        })
    }

    fn render_template(
        &self,
        template: &Template,
        photos: &[PhotoAsset],
        profile: &TargetProfile,
    ) -> EngineResult<ComposedImage> {
        let (width, height) = profile.dimensions(template, &self.config)?;
        let geometry = resolve(template, width, height)?;

        if photos.len() > geometry.slots.len() {
            tracing::debug!(
                template = %template.id,
                supplied = photos.len(),
                slots = geometry.slots.len(),
                "ignoring photos beyond slot count"
            );
        }

        let mut ordered: Vec<&PhotoAsset> = photos.iter().collect();
        ordered.sort_by_key(|p| p.sequence);
        let ordered: Vec<PhotoAsset> = ordered
            .into_iter()
            .take(geometry.slots.len())
            .cloned()
            .collect();

        let composition = Compositor::new(self.assets.as_ref(), &self.config).compose(
            template,
            &geometry,
            &ordered,
            profile.finish,
        )?;

        let photo_ids: Vec<String> = ordered.iter().map(PhotoAsset::identity).collect();
        let appearance = Appearance::new(template, &self.config, composition.asset_digests);
        let fingerprint = compute_fingerprint(
            &geometry,
            &appearance,
            &photo_ids,
            profile.finish,
            &profile.encoding,
        )?;
        let data = encode(composition.image, &profile.encoding)?;

        tracing::info!(
            template = %template.id,
            width,
            height,
            placeholders = composition.diagnostics.len(),
            "render complete"
        );

        Ok(ComposedImage {
            id: Uuid::new_v4().to_string(),
            template_id: template.id.clone(),
            template_version: template.template_version.clone(),
            engine_version: ENGINE_VERSION.to_string(),
            rendered_at: Utc::now(),
            width,
            height,
            encoding: profile.encoding.clone(),
            fingerprint,
            diagnostics: composition.diagnostics,
            data,
            geometry,
        })
    }
}

fn join<T>(handle: std::thread::ScopedJoinHandle<'_, EngineResult<T>>) -> EngineResult<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(EngineError::CompositionFailed("render worker panicked".into())))
}

fn encode(image: RgbaImage, encoding: &Encoding) -> EngineResult<Vec<u8>> {
    match encoding {
        Encoding::Raw => Ok(image.into_raw()),
        Encoding::Png => {
            let mut buf = Vec::new();
            DynamicImage::ImageRgba8(image)
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .map_err(|e| EngineError::Encoding(e.to_string()))?;
            Ok(buf)
        }
        Encoding::Jpeg { quality } => {
            let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
            let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
            let mut buf = Vec::new();
            JpegEncoder::new_with_quality(&mut buf, q)
                .encode_image(&rgb)
                .map_err(|e| EngineError::Encoding(e.to_string()))?;
            Ok(buf)
        }
    }
}

impl Default for OutputEmitter {
    fn default() -> Self {
        Self::new(TemplateCatalog::default())
    }
}
