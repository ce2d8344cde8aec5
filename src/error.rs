//! Engine errors
//!
//! Per-slot photo failures are not errors; they surface as diagnostics on the
//! composed image.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid template {id}: {reason}")]
    InvalidTemplate { id: String, reason: String },

    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Composition failed: {0}")]
    CompositionFailed(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid_template(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Stable tag used in machine-readable error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidTemplate { .. } => "invalid_template",
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidTarget(_) => "invalid_target",
            EngineError::CompositionFailed(_) => "composition_failed",
            EngineError::Encoding(_) => "encoding_error",
            EngineError::Io(_) => "io_error",
            EngineError::Serialization(_) => "serialization_error",
        }
    }

    /// Whether a caller can recover by re-selecting a template or retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound(_) | EngineError::CompositionFailed(_)
        )
    }
}
