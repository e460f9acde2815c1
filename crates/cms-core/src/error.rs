//! Error types for CMS Core
//!
//! Wraps the per-crate errors so callers of [`crate::CmsService`] handle a
//! single type.

use cms_reconcile::{BackendError, ReconcileError};
use cms_store::{StorageError, StoreError};
use std::path::PathBuf;

/// Main CMS error type
#[derive(Debug, thiserror::Error)]
pub enum CmsError {
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Collection not registered
    #[error("unknown collection: '{0}'")]
    UnknownCollection(String),

    /// Collection save or load failed
    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Backend failed outside a save
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Content store rejected the operation
    #[error("content store error: {0}")]
    Store(#[from] StoreError),

    /// Content store medium could not be opened
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Every key of a content write failed
    #[error("content '{content_type}' was not persisted to any key")]
    NotPersisted {
        /// Content type written
        content_type: String,
    },
}

impl CmsError {
    /// Check if retrying may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend(e) => e.is_retryable(),
            Self::Reconcile(ReconcileError::Load { source, .. }) => source.is_retryable(),
            Self::NotPersisted { .. } => true,
            _ => false,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML or unknown value
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parse but contradict each other
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
