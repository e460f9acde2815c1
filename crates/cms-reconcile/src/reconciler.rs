//! Applying change sets
//!
//! Phases run in a fixed order: deletions, creations, updates. Every
//! operation of a phase settles before the next phase starts. Within a phase
//! calls are issued concurrently, up to `max_in_flight`.

use crate::backend::{BackendError, ItemBackend};
use crate::change_set::{compute_change_set, ChangeSet};
use cms_content::{CollectionItem, CollectionSchema, ItemId, Snapshot};
use futures::stream::{self, StreamExt};
use std::fmt;

/// Default number of concurrent calls per phase
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Kind of per-item backend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `create_item`
    Create,
    /// `update_item`
    Update,
    /// `delete_item`
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// One failed item operation
#[derive(Debug)]
pub struct ItemFailure {
    /// Operation attempted
    pub operation: Operation,
    /// Item as sent
    pub item: CollectionItem,
    /// Backend error
    pub error: BackendError,
}

/// Operations that reached the backend
///
/// Lets callers fold a partial save into their persisted baseline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedChanges {
    /// Identities removed remotely
    pub deleted: Vec<ItemId>,
    /// Local items as created, carrying their new identity
    pub created: Vec<CollectionItem>,
    /// Local items as updated
    pub updated: Vec<CollectionItem>,
}

/// Aggregate outcome of a save, for the editing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// Nothing to do, no call issued
    NoChanges,
    /// Every operation succeeded
    Saved,
    /// Some operations failed
    PartiallySaved,
    /// Every operation failed
    Failed,
}

impl SaveStatus {
    /// At least one change reached the backend (or none was needed)
    #[inline]
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Outcome of [`Reconciler::apply`]
#[derive(Debug, Default)]
pub struct ReconciliationResult {
    /// Successful creations
    pub created: usize,
    /// Successful updates
    pub updated: usize,
    /// Successful deletions
    pub deleted: usize,
    /// Failed operations, in phase then item order
    pub failures: Vec<ItemFailure>,
    /// Created remotely but no single working item matched the natural key
    pub unmatched: Vec<CollectionItem>,
    /// Successful operations, for baseline bookkeeping
    pub persisted: PersistedChanges,
}

impl ReconciliationResult {
    /// Result for an empty change set
    #[inline]
    #[must_use]
    pub fn no_changes() -> Self {
        Self::default()
    }

    /// Number of operations attempted
    #[inline]
    #[must_use]
    pub fn total_operations(&self) -> usize {
        self.created + self.updated + self.deleted + self.failures.len()
    }

    /// Whether no operation was attempted
    #[inline]
    #[must_use]
    pub fn is_no_changes(&self) -> bool {
        self.total_operations() == 0
    }

    /// Aggregate status
    #[must_use]
    pub fn status(&self) -> SaveStatus {
        let total = self.total_operations();
        if total == 0 {
            SaveStatus::NoChanges
        } else if self.failures.is_empty() {
            SaveStatus::Saved
        } else if self.failures.len() == total {
            SaveStatus::Failed
        } else {
            SaveStatus::PartiallySaved
        }
    }
}

/// Change-set reconciler for one collection
#[derive(Debug, Clone)]
pub struct Reconciler {
    schema: CollectionSchema,
    max_in_flight: usize,
}

impl Reconciler {
    /// Create reconciler for a collection
    #[inline]
    #[must_use]
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Limit concurrent calls within a phase (minimum 1)
    #[inline]
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Collection schema
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Compute the change set between two snapshots
    #[inline]
    #[must_use]
    pub fn compute(&self, original: &Snapshot, working: &Snapshot) -> ChangeSet {
        compute_change_set(&self.schema, original, working)
    }

    /// Apply a change set against the backend
    ///
    /// Per-item failures are recorded, never propagated. Identities of
    /// created items are written back onto `working` by natural key.
    ///
    /// # Returns
    /// Counts, failures and the operations that reached the backend
    pub async fn apply<B>(
        &self,
        change_set: ChangeSet,
        backend: &B,
        working: &mut Snapshot,
    ) -> ReconciliationResult
    where
        B: ItemBackend + ?Sized,
    {
        if change_set.is_empty() {
            tracing::debug!("No changes for {}", self.schema.name);
            return ReconciliationResult::no_changes();
        }

        let collection = self.schema.name.as_str();
        let mut result = ReconciliationResult::default();

        // Deletions first: a replaced item may reuse the natural key
        let deletions = stream::iter(change_set.deleted)
            .map(|item| async move {
                let outcome = match item.id.clone() {
                    Some(id) => backend.delete_item(collection, &id).await.map(|()| id),
                    None => Err(BackendError::MissingIdentity),
                };
                (item, outcome)
            })
            .buffered(self.max_in_flight)
            .collect::<Vec<_>>()
            .await;

        for (item, outcome) in deletions {
            match outcome {
                Ok(id) => {
                    result.deleted += 1;
                    result.persisted.deleted.push(id);
                }
                Err(error) => self.record_failure(&mut result, Operation::Delete, item, error),
            }
        }

        let creations = stream::iter(change_set.created)
            .map(|item| async move {
                let outcome = backend.create_item(collection, &item).await;
                (item, outcome)
            })
            .buffered(self.max_in_flight)
            .collect::<Vec<_>>()
            .await;

        // Write-back is sequential; each touches only its own item
        for (item, outcome) in creations {
            match outcome.and_then(|created| created.id.ok_or(BackendError::MissingIdentity)) {
                Ok(id) => {
                    result.created += 1;
                    let mut persisted = item;
                    persisted.id = Some(id);
                    if !self.write_back_identity(working, &persisted) {
                        result.unmatched.push(persisted.clone());
                    }
                    result.persisted.created.push(persisted);
                }
                Err(error) => self.record_failure(&mut result, Operation::Create, item, error),
            }
        }

        let updates = stream::iter(change_set.updated)
            .map(|item| async move {
                let outcome = match &item.id {
                    Some(id) => backend.update_item(collection, id, &item).await.map(|_| ()),
                    None => Err(BackendError::MissingIdentity),
                };
                (item, outcome)
            })
            .buffered(self.max_in_flight)
            .collect::<Vec<_>>()
            .await;

        for (item, outcome) in updates {
            match outcome {
                Ok(()) => {
                    result.updated += 1;
                    result.persisted.updated.push(item);
                }
                Err(error) => self.record_failure(&mut result, Operation::Update, item, error),
            }
        }

        tracing::info!(
            "Reconciled {}: {} created, {} updated, {} deleted, {} failed",
            collection,
            result.created,
            result.updated,
            result.deleted,
            result.failures.len()
        );

        result
    }

    /// Assign the identity of a created item to its unsaved working twin
    ///
    /// Only assigns when exactly one unidentified, non-draft working item has
    /// the same natural key.
    fn write_back_identity(&self, working: &mut Snapshot, created: &CollectionItem) -> bool {
        let key = self.schema.natural_key_of(created);
        let mut candidates = working.iter_mut().filter(|candidate| {
            !candidate.has_identity()
                && !self.schema.is_draft(candidate)
                && self.schema.natural_key_of(candidate) == key
        });

        match (candidates.next(), candidates.next()) {
            (Some(target), None) => {
                target.id.clone_from(&created.id);
                true
            }
            (None, _) => {
                tracing::warn!(
                    "Created {} item '{}' has no unsaved counterpart in working snapshot",
                    self.schema.name,
                    key
                );
                false
            }
            (Some(_), Some(_)) => {
                tracing::warn!(
                    "Created {} item '{}' matches several unsaved items, identity not assigned",
                    self.schema.name,
                    key
                );
                false
            }
        }
    }

    fn record_failure(
        &self,
        result: &mut ReconciliationResult,
        operation: Operation,
        item: CollectionItem,
        error: BackendError,
    ) {
        tracing::warn!(
            "Failed to {} {} item '{}': {}",
            operation,
            self.schema.name,
            self.schema.natural_key_of(&item),
            error
        );
        result.failures.push(ItemFailure {
            operation,
            item,
            error,
        });
    }
}
