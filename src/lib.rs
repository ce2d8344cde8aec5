//! PhotoGrid Core - Template-Driven Photo Compositing
//!
//! # Guarantees
//! 1. Templates Are Frozen: geometry never changes under a published id
//! 2. Catalogs Validate Whole: one bad template fails the load
//! 3. Photos Map By Position: z-order, then declaration order
//! 4. Bad Photos Degrade: placeholders and diagnostics, never errors
//! 5. One Layout, Every Target: preview, print and export share geometry
//! 6. Deterministic Output: same inputs, same fingerprint

pub mod assets;
pub mod compositor;
pub mod config;
pub mod error;
pub mod geometry;
pub mod hashing;
pub mod pipeline;
pub mod profile;
pub mod templates;
pub mod validation;

pub use assets::{AssetError, AssetResolver, DirAssets, InlineAssets, PhotoAsset};
pub use compositor::{PlaceholderReason, SlotDiagnostic};
pub use config::{ConfigError, RenderConfig};
pub use error::{EngineError, EngineResult};
pub use geometry::{resolve, PixelRect, ResolvedGeometry, ResolvedSlot};
pub use hashing::{canonical_json, compute_fingerprint, sha256_hex, Appearance};
pub use pipeline::{ComposedImage, OutputEmitter, RenderSet};
pub use profile::{DpiPreset, Encoding, Preset, TargetProfile, TargetSize};
pub use templates::{
    AspectRatio, LogoOverlay, MetadataPatch, PreviewType, Slot, Template, TemplateCatalog,
    TemplateId,
};
pub use validation::{TemplateValidator, TemplateViolation, ValidationReport, ViolationSeverity};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
