//! Photo assets and template asset resolution.
//!
//! Photos arrive as bytes owned by the calling session. Background and logo
//! references in templates are resolved through an [`AssetResolver`].

use base64::Engine as _;
use image::DynamicImage;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::hashing::sha256_hex;

/// One captured photo plus its position in the session's capture order.
#[derive(Debug, Clone)]
pub struct PhotoAsset {
    pub sequence: u32,
    data: Arc<[u8]>,
}

impl PhotoAsset {
    pub fn from_bytes(sequence: u32, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            sequence,
            data: bytes.into(),
        }
    }

    /// Accepts `data:image/...;base64,...` URLs as produced by the capture flow.
    pub fn from_data_url(sequence: u32, url: &str) -> Result<Self, AssetError> {
        Ok(Self::from_bytes(sequence, decode_data_url(url)?))
    }

    pub fn from_path(sequence: u32, path: &Path) -> Result<Self, AssetError> {
        let bytes = std::fs::read(path).map_err(|e| AssetError::Unreadable {
            reference: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_bytes(sequence, bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Content identity used in render fingerprints.
    pub fn identity(&self) -> String {
        sha256_hex(&self.data)
    }

    pub fn decode(&self) -> Result<DynamicImage, AssetError> {
        decode_image(&self.data)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Failed to read asset {reference}: {reason}")]
    Unreadable { reference: String, reason: String },

    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, AssetError> {
    if bytes.is_empty() {
        return Err(AssetError::Decode("empty image data".to_string()));
    }
    let img = image::load_from_memory(bytes).map_err(|e| AssetError::Decode(e.to_string()))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(AssetError::Decode("zero-sized image".to_string()));
    }
    Ok(img)
}

pub fn decode_data_url(url: &str) -> Result<Vec<u8>, AssetError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| AssetError::MalformedDataUrl("missing data: prefix".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::MalformedDataUrl("missing payload separator".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(AssetError::MalformedDataUrl(
            "only base64 payloads are supported".to_string(),
        ));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| AssetError::MalformedDataUrl(e.to_string()))
}

/// Source of bytes for template-level assets (background image, logo).
pub trait AssetResolver: Send + Sync {
    fn load(&self, reference: &str) -> Result<Vec<u8>, AssetError>;
}

/// In-memory assets keyed by reference. `data:` URLs resolve without registration.
#[derive(Debug, Clone, Default)]
pub struct InlineAssets {
    assets: HashMap<String, Arc<[u8]>>,
}

impl InlineAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.assets.insert(reference.into(), bytes.into());
    }

    pub fn with(mut self, reference: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(reference, bytes);
        self
    }
}

impl AssetResolver for InlineAssets {
    fn load(&self, reference: &str) -> Result<Vec<u8>, AssetError> {
        if reference.starts_with("data:") {
            return decode_data_url(reference);
        }
        self.assets
            .get(reference)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| AssetError::NotFound(reference.to_string()))
    }
}

/// Resolves relative references under a root directory.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, reference: &str) -> Result<PathBuf, AssetError> {
        let relative = Path::new(reference.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AssetError::NotFound(reference.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl AssetResolver for DirAssets {
    fn load(&self, reference: &str) -> Result<Vec<u8>, AssetError> {
        if reference.starts_with("data:") {
            return decode_data_url(reference);
        }
        let path = self.path_for(reference)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(reference.to_string()),
            _ => AssetError::Unreadable {
                reference: reference.to_string(),
                reason: e.to_string(),
            },
        })
    }
}
