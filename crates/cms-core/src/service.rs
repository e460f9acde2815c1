//! CMS service facade
//!
//! Wires the collection backend, the content store and the collection
//! schemas behind one handle for the binary and any admin API.

use crate::config::{BackendKind, CmsConfig, StorageKind};
use crate::error::CmsError;
use crate::file_backend::JsonFileBackend;
use cms_content::{builtin_schemas, CollectionSchema, Snapshot};
use cms_reconcile::{
    ChangeSet, CollectionEditor, ItemBackend, MemoryBackend, ReconciliationResult, Reconciler,
};
use cms_store::{
    ContentChanged, FileStorage, KeyTable, KeyValueStorage, MemoryStorage, ResilientContentStore,
    WriteReport,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared storage medium
pub type SharedStorage = Arc<dyn KeyValueStorage>;

/// Entry point to collections and site content
pub struct CmsService {
    schemas: BTreeMap<String, CollectionSchema>,
    backend: Arc<dyn ItemBackend>,
    store: ResilientContentStore<SharedStorage>,
    max_in_flight: usize,
}

impl fmt::Debug for CmsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsService")
            .field("collections", &self.schemas.keys().collect::<Vec<_>>())
            .field("store", &self.store)
            .field("max_in_flight", &self.max_in_flight)
            .finish_non_exhaustive()
    }
}

impl CmsService {
    /// Assemble a service from parts
    ///
    /// Built-in collections are always registered.
    #[must_use]
    pub fn new(backend: Arc<dyn ItemBackend>, storage: SharedStorage, keys: KeyTable) -> Self {
        let schemas = builtin_schemas()
            .into_iter()
            .map(|schema| (schema.name.clone(), schema))
            .collect();

        Self {
            schemas,
            backend,
            store: ResilientContentStore::with_key_table(storage, keys),
            max_in_flight: cms_reconcile::DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Everything in memory, default keys
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(MemoryStorage::new()),
            KeyTable::site_defaults(),
        )
    }

    /// Build a service as described by `config`
    ///
    /// # Errors
    /// - [`CmsError::Config`] if the configuration is inconsistent
    /// - [`CmsError::Storage`] / [`CmsError::Backend`] if a data directory
    ///   cannot be created
    pub async fn from_config(config: &CmsConfig) -> Result<Self, CmsError> {
        config.validate()?;

        let storage: SharedStorage = match config.storage.kind {
            StorageKind::Memory => match config.storage.quota_bytes {
                Some(quota) => Arc::new(MemoryStorage::with_quota(quota)),
                None => Arc::new(MemoryStorage::new()),
            },
            StorageKind::File => Arc::new(FileStorage::open(config.content_dir())?),
        };

        let backend: Arc<dyn ItemBackend> = match config.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::File => Arc::new(JsonFileBackend::open(config.collections_dir()).await?),
        };

        let keys = KeyTable::site_defaults().with_overrides(&config.content_keys);

        let mut service =
            Self::new(backend, storage, keys).with_max_in_flight(config.max_in_flight);
        for schema in &config.collections {
            service.register(schema.clone());
        }

        tracing::info!(
            "CMS ready: {} collections, {} content types, storage {:?}, backend {:?}",
            service.schemas.len(),
            service.store.key_table().len(),
            config.storage.kind,
            config.backend
        );
        Ok(service)
    }

    /// With concurrent calls per save phase
    #[inline]
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Register or replace a collection schema
    pub fn register(&mut self, schema: CollectionSchema) {
        tracing::debug!("Registering collection {}", schema.name);
        self.schemas.insert(schema.name.clone(), schema);
    }

    /// Registered collections, by name
    pub fn collections(&self) -> impl Iterator<Item = &CollectionSchema> {
        self.schemas.values()
    }

    /// Schema of a collection
    ///
    /// # Errors
    /// [`CmsError::UnknownCollection`] if not registered
    pub fn schema(&self, collection: &str) -> Result<&CollectionSchema, CmsError> {
        self.schemas
            .get(collection)
            .ok_or_else(|| CmsError::UnknownCollection(collection.to_string()))
    }

    /// Collection backend
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &dyn ItemBackend {
        self.backend.as_ref()
    }

    /// Content store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &ResilientContentStore<SharedStorage> {
        &self.store
    }

    /// Editor loaded with the persisted collection
    ///
    /// # Errors
    /// Unknown collection or backend listing failure
    pub async fn open_editor(&self, collection: &str) -> Result<CollectionEditor, CmsError> {
        let schema = self.schema(collection)?.clone();
        let mut editor = CollectionEditor::new(schema).with_max_in_flight(self.max_in_flight);
        editor.load(self.backend.as_ref()).await?;
        Ok(editor)
    }

    /// Persisted items of a collection, in display order
    ///
    /// # Errors
    /// Unknown collection or backend listing failure
    pub async fn list_collection(&self, collection: &str) -> Result<Snapshot, CmsError> {
        Ok(self.open_editor(collection).await?.original().clone())
    }

    /// Converge the backend on `working`
    ///
    /// Loads the persisted collection as baseline, then saves `working`
    /// against it.
    ///
    /// # Errors
    /// Unknown collection, listing failure or invalid `working` snapshot.
    /// Per-item failures are reported in the result.
    pub async fn sync_collection(
        &self,
        collection: &str,
        working: Snapshot,
    ) -> Result<ReconciliationResult, CmsError> {
        let mut editor = self.open_editor(collection).await?;
        editor.replace_working(working);
        Ok(editor.save(self.backend.as_ref()).await?)
    }

    /// Change set between two snapshots of a collection, without applying it
    ///
    /// # Errors
    /// [`CmsError::UnknownCollection`] if not registered
    pub fn diff_collection(
        &self,
        collection: &str,
        original: &Snapshot,
        working: &Snapshot,
    ) -> Result<ChangeSet, CmsError> {
        let reconciler = Reconciler::new(self.schema(collection)?.clone());
        Ok(reconciler.compute(original, working))
    }

    /// Read site content, `default` if nothing usable is stored
    pub fn read_content<T: DeserializeOwned>(&self, content_type: &str, default: T) -> T {
        self.store.read(content_type, default)
    }

    /// Write site content to every key of its type
    ///
    /// # Errors
    /// - [`CmsError::Store`] for unknown types or unserializable payloads
    /// - [`CmsError::NotPersisted`] if no key accepted the write
    pub fn write_content<T>(&self, content_type: &str, payload: &T) -> Result<WriteReport, CmsError>
    where
        T: Serialize + ?Sized,
    {
        let report = self.store.write(content_type, payload)?;
        if !report.is_persisted() {
            return Err(CmsError::NotPersisted {
                content_type: content_type.to_string(),
            });
        }
        Ok(report)
    }

    /// Remove site content from every key
    ///
    /// # Errors
    /// [`CmsError::Store`] for unknown types
    pub fn remove_content(&self, content_type: &str) -> Result<WriteReport, CmsError> {
        Ok(self.store.remove(content_type)?)
    }

    /// Subscribe to content writes
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ContentChanged> {
        self.store.subscribe()
    }
}
