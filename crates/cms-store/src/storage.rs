//! Key/value storage media
//!
//! Synchronous and capacity-bounded, like a browser's local storage.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Raw string key/value medium
pub trait KeyValueStorage: Send + Sync + std::fmt::Debug {
    /// Value stored under `key`, if any
    ///
    /// # Errors
    /// Medium-specific read failure
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    /// Quota or medium-specific write failure
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`; removing a missing key is not an error
    ///
    /// # Errors
    /// Medium-specific failure
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorage for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// Failure of a single storage key
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Capacity bound reached
    #[error("quota exceeded writing '{key}': need {needed} bytes, {available} available")]
    QuotaExceeded {
        /// Key being written
        key: String,
        /// Bytes the write needs
        needed: usize,
        /// Bytes left
        available: usize,
    },

    /// Key cannot be mapped onto the medium
    #[error("invalid storage key: '{0}'")]
    InvalidKey(String),

    /// IO failure of a file-backed medium
    #[error("io error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Medium not reachable
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// In-memory storage with optional byte quota
///
/// Usage counts key and value bytes.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    /// Unbounded storage
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage refusing writes beyond `quota_bytes`
    #[inline]
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RwLock::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Bytes currently used
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries
            .read()
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }

    /// Number of stored keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write();

        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(used);
            if needed > available {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}
