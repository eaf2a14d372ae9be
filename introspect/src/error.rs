//! Error types for capability discovery.

use thiserror::Error;

/// Errors that can occur while probing the tool or persisting the cache.
#[derive(Debug, Error)]
pub enum IntrospectError {
    /// Process spawn or file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The tool binary could not be located.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// A persisted cache was rejected by the validity check.
    #[error(transparent)]
    StaleCache(#[from] ffqueue_core::CacheValidityError),
}

/// Convenience alias for results with [`IntrospectError`].
pub type Result<T> = std::result::Result<T, IntrospectError>;
