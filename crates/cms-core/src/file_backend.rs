//! File-backed collection backend
//!
//! Each collection is one pretty-printed JSON array in
//! `<dir>/<collection>.json`. Calls on the same collection are serialized;
//! different collections proceed independently.

use async_trait::async_trait;
use cms_content::{CollectionItem, ItemId, Snapshot};
use cms_reconcile::{BackendError, ItemBackend};
use dashmap::DashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use ulid::Ulid;

/// [`ItemBackend`] over a directory of JSON documents
#[derive(Debug)]
pub struct JsonFileBackend {
    dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl JsonFileBackend {
    /// Open (and create if needed) a backend directory
    ///
    /// # Errors
    /// [`BackendError::Io`] if the directory cannot be created
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    /// Backend directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, collection: &str) -> Result<PathBuf, BackendError> {
        let valid = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
        if !valid {
            return Err(BackendError::Rejected(format!(
                "invalid collection name '{collection}'"
            )));
        }
        Ok(self.dir.join(format!("{collection}.json")))
    }

    fn lock_for(&self, collection: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(collection.to_string())
            .or_default()
            .value()
            .clone()
    }

    async fn load(&self, path: &Path) -> Result<Snapshot, BackendError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) if text.trim().is_empty() => Ok(Snapshot::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Snapshot::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, path: &Path, snapshot: &Snapshot) -> Result<(), BackendError> {
        let text = serde_json::to_string_pretty(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read-modify-write one collection under its lock
    async fn modify<T, F>(&self, collection: &str, change: F) -> Result<T, BackendError>
    where
        F: FnOnce(&mut Snapshot) -> Result<T, BackendError> + Send,
        T: Send,
    {
        let path = self.path_for(collection)?;
        let lock = self.lock_for(collection);
        let _guard = lock.lock().await;

        let mut snapshot = self.load(&path).await?;
        let out = change(&mut snapshot)?;
        self.store(&path, &snapshot).await?;
        Ok(out)
    }
}

#[async_trait]
impl ItemBackend for JsonFileBackend {
    async fn list_items(&self, collection: &str) -> Result<Vec<CollectionItem>, BackendError> {
        let path = self.path_for(collection)?;
        let lock = self.lock_for(collection);
        let _guard = lock.lock().await;
        Ok(self.load(&path).await?.into_items())
    }

    async fn create_item(
        &self,
        collection: &str,
        item: &CollectionItem,
    ) -> Result<CollectionItem, BackendError> {
        let mut stored = item.clone();
        stored.id = Some(ItemId::new(Ulid::new().to_string()));

        let created = self
            .modify(collection, |snapshot| {
                snapshot.push(stored.clone());
                Ok(stored)
            })
            .await?;

        tracing::debug!("Created {}/{:?}", collection, created.id);
        Ok(created)
    }

    async fn update_item(
        &self,
        collection: &str,
        id: &ItemId,
        item: &CollectionItem,
    ) -> Result<CollectionItem, BackendError> {
        self.modify(collection, |snapshot| {
            let existing = snapshot
                .find_mut(id)
                .ok_or_else(|| BackendError::not_found(collection, id.clone()))?;
            existing.fields = item.fields.clone();
            existing.order = item.order;
            Ok(existing.clone())
        })
        .await
    }

    async fn delete_item(&self, collection: &str, id: &ItemId) -> Result<(), BackendError> {
        self.modify(collection, |snapshot| {
            snapshot
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| BackendError::not_found(collection, id.clone()))
        })
        .await
    }
}
