//! Resilient content store
//!
//! Writes every payload to all keys of its content type and reads back the
//! first usable copy. A failed, emptied or corrupted key only costs one
//! level of redundancy.

use crate::keys::{ContentKeySet, KeyTable};
use crate::storage::{KeyValueStorage, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

/// Capacity of the change notification channel
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Notification that a content type was rewritten
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChanged {
    /// Content type written
    pub content_type: String,
}

/// Errors that stop a write before any key is touched
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No key set configured for the content type
    #[error("unknown content type: '{0}'")]
    UnknownContentType(String),

    /// Payload could not be serialized
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Payload serializes to JSON `null`, which reads back as absent
    #[error("null payload for content type '{0}', use remove instead")]
    NullPayload(String),
}

/// Per-key outcome of a write
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Keys that accepted the payload, in write order
    pub written: Vec<String>,
    /// Keys that failed, in write order
    pub failed: Vec<(String, StorageError)>,
}

impl WriteReport {
    /// At least one key holds the payload
    #[inline]
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.written.is_empty()
    }

    /// Every key holds the payload
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Multi-key content store over a key/value medium
#[derive(Debug)]
pub struct ResilientContentStore<S> {
    storage: S,
    keys: KeyTable,
    changes: broadcast::Sender<ContentChanged>,
}

impl<S: KeyValueStorage> ResilientContentStore<S> {
    /// Store with the site's default key table
    #[inline]
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self::with_key_table(storage, KeyTable::site_defaults())
    }

    /// Store with an explicit key table
    #[must_use]
    pub fn with_key_table(storage: S, keys: KeyTable) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            storage,
            keys,
            changes,
        }
    }

    /// Underlying medium
    #[inline]
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Key table in use
    #[inline]
    #[must_use]
    pub fn key_table(&self) -> &KeyTable {
        &self.keys
    }

    /// Receive a [`ContentChanged`] for every persisted write
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ContentChanged> {
        self.changes.subscribe()
    }

    /// Write `payload` to every key of `content_type`
    ///
    /// The payload is serialized once. Keys are written in order and a
    /// failing key does not stop the remaining ones. Observers are notified
    /// when at least one key accepted the write.
    ///
    /// # Errors
    /// - [`StoreError::UnknownContentType`] if no key set is configured
    /// - [`StoreError::Serialize`] if the payload cannot be serialized
    /// - [`StoreError::NullPayload`] if the payload serializes to `null`
    ///
    /// Key failures are reported in the [`WriteReport`], not as an error.
    pub fn write<T>(&self, content_type: &str, payload: &T) -> Result<WriteReport, StoreError>
    where
        T: Serialize + ?Sized,
    {
        let set = self.key_set(content_type)?;
        let value = serde_json::to_value(payload)?;
        if value.is_null() {
            return Err(StoreError::NullPayload(content_type.to_string()));
        }
        let serialized = value.to_string();

        let mut report = WriteReport::default();
        for key in set.keys() {
            match self.storage.set(key, &serialized) {
                Ok(()) => report.written.push(key.clone()),
                Err(e) => {
                    tracing::warn!("Failed to write {} to key {}: {}", content_type, key, e);
                    report.failed.push((key.clone(), e));
                }
            }
        }

        if report.is_persisted() {
            tracing::info!(
                "Saved {} to {}/{} keys",
                content_type,
                report.written.len(),
                set.keys().len()
            );
            self.notify(content_type);
        } else {
            tracing::error!("Saving {} failed on every key", content_type);
        }

        Ok(report)
    }

    /// Read `content_type`, falling back key by key, then to `default`
    ///
    /// A key counts as empty when absent, blank or JSON `null`. A key holding
    /// unparseable data is logged and skipped.
    pub fn read<T>(&self, content_type: &str, default: T) -> T
    where
        T: DeserializeOwned,
    {
        let Some(set) = self.keys.get(content_type) else {
            tracing::warn!("No key set for content type {}, using default", content_type);
            return default;
        };

        for key in set.keys() {
            let raw = match self.storage.get(key) {
                Ok(Some(raw)) if !raw.trim().is_empty() => raw,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("Failed to read key {}: {}", key, e);
                    continue;
                }
            };

            match parse_value::<T>(&raw) {
                Ok(Some(value)) => {
                    tracing::debug!("Loaded {} from key {}", content_type, key);
                    return value;
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Corrupt {} data under key {}: {}", content_type, key, e);
                }
            }
        }

        tracing::debug!("No stored {}, using default", content_type);
        default
    }

    /// Remove `content_type` from every key
    ///
    /// # Errors
    /// [`StoreError::UnknownContentType`] if no key set is configured
    pub fn remove(&self, content_type: &str) -> Result<WriteReport, StoreError> {
        let set = self.key_set(content_type)?;

        let mut report = WriteReport::default();
        for key in set.keys() {
            match self.storage.remove(key) {
                Ok(()) => report.written.push(key.clone()),
                Err(e) => {
                    tracing::warn!("Failed to remove key {}: {}", key, e);
                    report.failed.push((key.clone(), e));
                }
            }
        }

        if report.is_persisted() {
            self.notify(content_type);
        }
        Ok(report)
    }

    fn key_set(&self, content_type: &str) -> Result<&ContentKeySet, StoreError> {
        self.keys
            .get(content_type)
            .ok_or_else(|| StoreError::UnknownContentType(content_type.to_string()))
    }

    fn notify(&self, content_type: &str) {
        // No subscriber is fine
        let _ = self.changes.send(ContentChanged {
            content_type: content_type.to_string(),
        });
    }
}

fn parse_value<T: DeserializeOwned>(raw: &str) -> Result<Option<T>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        title: String,
        body: String,
    }

    fn greeting() -> Greeting {
        Greeting {
            title: "Welcome".to_string(),
            body: "Lead with purpose.".to_string(),
        }
    }

    #[test]
    fn write_then_read() {
        let store = ResilientContentStore::new(MemoryStorage::new());

        let report = store.write("greeting", &greeting()).unwrap();
        assert_eq!(report.written.len(), 3);
        assert!(report.is_complete());

        let read: Option<Greeting> = store.read("greeting", None);
        assert_eq!(read, Some(greeting()));
    }

    #[test]
    fn read_missing_returns_default() {
        let store = ResilientContentStore::new(MemoryStorage::new());
        let read = store.read("greeting", greeting());
        assert_eq!(read, greeting());
    }

    #[test]
    fn blank_and_null_keys_fall_through() {
        let store = ResilientContentStore::new(MemoryStorage::new());
        store.storage().set("content.greeting", "  ").unwrap();
        store.storage().set("content.greeting.backup", "null").unwrap();
        store
            .storage()
            .set(
                "legacy.greetingContent",
                &serde_json::to_string(&greeting()).unwrap(),
            )
            .unwrap();

        let read: Option<Greeting> = store.read("greeting", None);
        assert_eq!(read, Some(greeting()));
    }

    #[test]
    fn null_payload_is_rejected() {
        let store = ResilientContentStore::new(MemoryStorage::new());
        store.write("greeting", &greeting()).unwrap();
        let mut rx = store.subscribe();

        let err = store.write("greeting", &None::<Greeting>).unwrap_err();

        assert!(matches!(err, StoreError::NullPayload(_)));
        assert!(rx.try_recv().is_err());
        assert_eq!(store.read("greeting", None), Some(greeting()));
    }

    #[test]
    fn wrong_shape_falls_through() {
        let store = ResilientContentStore::new(MemoryStorage::new());
        store.storage().set("content.greeting", r#"{"title": 1}"#).unwrap();
        store
            .storage()
            .set(
                "content.greeting.backup",
                &serde_json::to_string(&greeting()).unwrap(),
            )
            .unwrap();

        let read: Option<Greeting> = store.read("greeting", None);
        assert_eq!(read, Some(greeting()));
    }

    #[test]
    fn unknown_content_type() {
        let store = ResilientContentStore::new(MemoryStorage::new());

        let err = store.write("nonsense", &greeting()).unwrap_err();
        assert!(matches!(err, StoreError::UnknownContentType(_)));
        assert_eq!(store.read("nonsense", 7_u32), 7);
    }

    #[test]
    fn total_write_failure_is_not_persisted() {
        let store = ResilientContentStore::new(MemoryStorage::with_quota(4));
        let mut rx = store.subscribe();

        let report = store.write("greeting", &greeting()).unwrap();
        assert!(!report.is_persisted());
        assert_eq!(report.failed.len(), 3);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn write_notifies_subscribers() {
        let store = ResilientContentStore::new(MemoryStorage::new());
        let mut rx = store.subscribe();

        store.write("schedule", &vec!["Module 1"]).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            ContentChanged {
                content_type: "schedule".to_string()
            }
        );
    }

    #[test]
    fn remove_clears_every_key() {
        let store = ResilientContentStore::new(MemoryStorage::new());
        store.write("greeting", &greeting()).unwrap();

        let report = store.remove("greeting").unwrap();
        assert_eq!(report.written.len(), 3);
        assert!(store.storage().is_empty());
        assert_eq!(store.read::<Option<Greeting>>("greeting", None), None);
    }
}
