//! Testing utilities for the exed-cms workspace
//!
//! Shared fixtures, a call-recording backend with failure injection, and a
//! storage medium that fails on chosen keys.

#![allow(missing_docs)]

use async_trait::async_trait;
use cms_content::{CollectionItem, ItemId, Snapshot};
use cms_reconcile::{BackendError, ItemBackend, MemoryBackend, Operation};
use cms_store::{KeyValueStorage, MemoryStorage, StorageError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn faculty_item(name: &str) -> CollectionItem {
    CollectionItem::new()
        .with_field("name", name)
        .with_field("term", "Fall 2024")
        .with_field("category", "Leadership")
}

pub fn saved_faculty_item(id: &str, name: &str) -> CollectionItem {
    faculty_item(name).with_id(id)
}

pub fn draft_faculty_item() -> CollectionItem {
    CollectionItem::new()
        .with_field("name", "")
        .with_field("term", "Spring 2025")
}

pub fn benefit_item(title: &str) -> CollectionItem {
    CollectionItem::new()
        .with_field("title", title)
        .with_field("description", format!("{title} description"))
}

pub fn snapshot_of(items: impl IntoIterator<Item = CollectionItem>) -> Snapshot {
    items
        .into_iter()
        .enumerate()
        .map(|(order, item)| {
            let order = i64::try_from(order).unwrap_or(i64::MAX);
            item.with_order(order)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Recording backend
// ---------------------------------------------------------------------------

/// Point in the lifetime of a backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Started,
    Finished,
}

/// One observed backend call event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvent {
    pub phase: CallPhase,
    pub operation: Operation,
    pub collection: String,
    /// Identity for update/delete, `name` or `title` field for create
    pub target: String,
}

#[derive(Debug, Default)]
struct FailureRules {
    all: bool,
    creates_named: HashSet<String>,
    ids: HashSet<(Operation, String)>,
}

/// [`MemoryBackend`] wrapper logging every call and failing on demand
///
/// Each call yields once between start and finish so a phase's calls really
/// overlap when issued concurrently.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    inner: MemoryBackend,
    events: Mutex<Vec<CallEvent>>,
    rules: Mutex<FailureRules>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(collection: &str, items: Vec<CollectionItem>) -> Self {
        Self {
            inner: MemoryBackend::new().with_collection(collection, items),
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    /// Fail `create_item` for items whose `name` or `title` is `name`
    pub fn fail_create_named(&self, name: &str) {
        self.rules.lock().creates_named.insert(name.to_string());
    }

    pub fn fail_update(&self, id: &str) {
        self.rules
            .lock()
            .ids
            .insert((Operation::Update, id.to_string()));
    }

    pub fn fail_delete(&self, id: &str) {
        self.rules
            .lock()
            .ids
            .insert((Operation::Delete, id.to_string()));
    }

    /// Fail every mutating call
    pub fn fail_all(&self) {
        self.rules.lock().all = true;
    }

    pub fn clear_failures(&self) {
        *self.rules.lock() = FailureRules::default();
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Started calls, in start order
    pub fn calls(&self) -> Vec<(Operation, String)> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.phase == CallPhase::Started)
            .map(|event| (event.operation, event.target.clone()))
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Highest number of calls observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn observe<T>(
        &self,
        operation: Operation,
        collection: &str,
        target: String,
        call: impl std::future::Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        let event = CallEvent {
            phase: CallPhase::Started,
            operation,
            collection: collection.to_string(),
            target,
        };
        self.events.lock().push(event.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::task::yield_now().await;

        let outcome = if self.should_fail(operation, &event.target) {
            Err(BackendError::Rejected(format!(
                "injected {operation} failure for {}",
                event.target
            )))
        } else {
            call.await
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().push(CallEvent {
            phase: CallPhase::Finished,
            ..event
        });
        outcome
    }

    fn should_fail(&self, operation: Operation, target: &str) -> bool {
        let rules = self.rules.lock();
        rules.all
            || (operation == Operation::Create && rules.creates_named.contains(target))
            || rules.ids.contains(&(operation, target.to_string()))
    }
}

fn display_name(item: &CollectionItem) -> String {
    item.field("name")
        .or_else(|| item.field("title"))
        .map(ToString::to_string)
        .unwrap_or_default()
}

#[async_trait]
impl ItemBackend for RecordingBackend {
    async fn list_items(&self, collection: &str) -> Result<Vec<CollectionItem>, BackendError> {
        self.inner.list_items(collection).await
    }

    async fn create_item(
        &self,
        collection: &str,
        item: &CollectionItem,
    ) -> Result<CollectionItem, BackendError> {
        self.observe(
            Operation::Create,
            collection,
            display_name(item),
            self.inner.create_item(collection, item),
        )
        .await
    }

    async fn update_item(
        &self,
        collection: &str,
        id: &ItemId,
        item: &CollectionItem,
    ) -> Result<CollectionItem, BackendError> {
        self.observe(
            Operation::Update,
            collection,
            id.to_string(),
            self.inner.update_item(collection, id, item),
        )
        .await
    }

    async fn delete_item(&self, collection: &str, id: &ItemId) -> Result<(), BackendError> {
        self.observe(
            Operation::Delete,
            collection,
            id.to_string(),
            self.inner.delete_item(collection, id),
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Flaky storage
// ---------------------------------------------------------------------------

/// [`MemoryStorage`] that fails reads or writes of chosen keys
#[derive(Debug, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    failing_writes: Mutex<HashSet<String>>,
    failing_reads: Mutex<HashSet<String>>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    pub fn fail_writes_to(&self, key: &str) {
        self.failing_writes.lock().insert(key.to_string());
    }

    pub fn fail_reads_from(&self, key: &str) {
        self.failing_reads.lock().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.failing_writes.lock().clear();
        self.failing_reads.lock().clear();
    }
}

impl KeyValueStorage for FlakyStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.failing_reads.lock().contains(key) {
            return Err(StorageError::Unavailable(format!("read of {key} refused")));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.failing_writes.lock().contains(key) {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                needed: key.len() + value.len(),
                available: 0,
            });
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.failing_writes.lock().contains(key) {
            return Err(StorageError::Unavailable(format!("remove of {key} refused")));
        }
        self.inner.remove(key)
    }
}
