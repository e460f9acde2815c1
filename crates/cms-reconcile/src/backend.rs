//! Item-collection backend
//!
//! The reconciler only needs per-item create/update/delete plus a listing
//! to capture the persisted baseline.

use async_trait::async_trait;
use cms_content::{CollectionItem, ItemId};
use dashmap::DashMap;
use ulid::Ulid;

/// Per-item persistence backend
///
/// Calls may fail independently; the reconciler never assumes a batch is
/// atomic.
#[async_trait]
pub trait ItemBackend: Send + Sync {
    /// All items of a collection, as persisted
    async fn list_items(&self, collection: &str) -> Result<Vec<CollectionItem>, BackendError>;

    /// Persist a new item and return it with its assigned identity
    async fn create_item(
        &self,
        collection: &str,
        item: &CollectionItem,
    ) -> Result<CollectionItem, BackendError>;

    /// Replace fields and order of an existing item
    async fn update_item(
        &self,
        collection: &str,
        id: &ItemId,
        item: &CollectionItem,
    ) -> Result<CollectionItem, BackendError>;

    /// Remove an item
    async fn delete_item(&self, collection: &str, id: &ItemId) -> Result<(), BackendError>;
}

/// Failure of a single backend call
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Identity unknown to the backend
    #[error("item not found: {collection}/{id}")]
    NotFound {
        /// Collection name
        collection: String,
        /// Missing identity
        id: ItemId,
    },

    /// Operation needs an identity the item does not carry
    #[error("item has no identity")]
    MissingIdentity,

    /// Backend refused the request
    #[error("backend rejected request: {0}")]
    Rejected(String),

    /// Temporary failure (network, timeout); retrying may succeed
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// Local IO failure of a file-backed backend
    #[error("backend io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored or returned payload could not be (de)serialized
    #[error("backend payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl BackendError {
    /// Create not-found error
    #[inline]
    #[must_use]
    pub fn not_found(collection: impl Into<String>, id: ItemId) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id,
        }
    }

    /// Check if retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Io(_))
    }
}

/// In-process backend keeping collections in memory
///
/// Identities are ULIDs. Suitable for tests and for running the admin API
/// without a document store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: DashMap<String, Vec<CollectionItem>>,
}

impl MemoryBackend {
    /// Create empty backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection, keeping item identities as given
    #[must_use]
    pub fn with_collection(
        self,
        collection: impl Into<String>,
        items: Vec<CollectionItem>,
    ) -> Self {
        self.collections.insert(collection.into(), items);
        self
    }

    /// Number of items stored in a collection
    #[must_use]
    pub fn item_count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |items| items.len())
    }
}

#[async_trait]
impl ItemBackend for MemoryBackend {
    async fn list_items(&self, collection: &str) -> Result<Vec<CollectionItem>, BackendError> {
        Ok(self
            .collections
            .get(collection)
            .map(|items| items.clone())
            .unwrap_or_default())
    }

    async fn create_item(
        &self,
        collection: &str,
        item: &CollectionItem,
    ) -> Result<CollectionItem, BackendError> {
        let mut stored = item.clone();
        stored.id = Some(ItemId::new(Ulid::new().to_string()));

        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    async fn update_item(
        &self,
        collection: &str,
        id: &ItemId,
        item: &CollectionItem,
    ) -> Result<CollectionItem, BackendError> {
        let mut items = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| BackendError::not_found(collection, id.clone()))?;

        let existing = items
            .iter_mut()
            .find(|existing| existing.id.as_ref() == Some(id))
            .ok_or_else(|| BackendError::not_found(collection, id.clone()))?;

        existing.fields = item.fields.clone();
        existing.order = item.order;

        Ok(existing.clone())
    }

    async fn delete_item(&self, collection: &str, id: &ItemId) -> Result<(), BackendError> {
        let mut items = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| BackendError::not_found(collection, id.clone()))?;

        let pos = items
            .iter()
            .position(|existing| existing.id.as_ref() == Some(id))
            .ok_or_else(|| BackendError::not_found(collection, id.clone()))?;

        items.remove(pos);
        Ok(())
    }
}
