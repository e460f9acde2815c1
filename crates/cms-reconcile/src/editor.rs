//! Editing session for one collection
//!
//! Holds the persisted baseline (`original`) next to the snapshot being
//! edited (`working`) and keeps the baseline truthful across full, partial
//! and failed saves. `working` is never discarded by a save.

use crate::backend::{BackendError, ItemBackend};
use crate::change_set::ChangeSet;
use crate::reconciler::{PersistedChanges, ReconciliationResult, Reconciler, SaveStatus};
use cms_content::{validate_snapshot, CollectionSchema, Snapshot, ValidationError};

/// Errors that stop a save or load before any item operation
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Working snapshot rejected, nothing sent
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Baseline could not be fetched
    #[error("failed to load collection '{collection}': {source}")]
    Load {
        /// Collection name
        collection: String,
        /// Backend failure
        #[source]
        source: BackendError,
    },
}

/// Original/working snapshot pair of one collection
#[derive(Debug, Clone)]
pub struct CollectionEditor {
    reconciler: Reconciler,
    original: Snapshot,
    working: Snapshot,
}

impl CollectionEditor {
    /// Start an editor on an empty collection
    #[inline]
    #[must_use]
    pub fn new(schema: CollectionSchema) -> Self {
        Self::from_persisted(schema, Snapshot::new())
    }

    /// Start an editor from a known persisted snapshot
    #[must_use]
    pub fn from_persisted(schema: CollectionSchema, persisted: Snapshot) -> Self {
        Self {
            reconciler: Reconciler::new(schema),
            working: persisted.clone(),
            original: persisted,
        }
    }

    /// Limit concurrent backend calls per phase
    #[inline]
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.reconciler = self.reconciler.with_max_in_flight(max_in_flight);
        self
    }

    /// Fetch the collection and reset both snapshots to it
    ///
    /// Items are sorted by display position.
    ///
    /// # Errors
    /// [`ReconcileError::Load`] if listing fails; the editor is unchanged.
    pub async fn load<B>(&mut self, backend: &B) -> Result<usize, ReconcileError>
    where
        B: ItemBackend + ?Sized,
    {
        let collection = &self.reconciler.schema().name;
        let items = backend
            .list_items(collection)
            .await
            .map_err(|source| ReconcileError::Load {
                collection: collection.clone(),
                source,
            })?;

        let mut snapshot = Snapshot::from(items);
        snapshot.sort_by_order();
        tracing::info!("Loaded {} items of {}", snapshot.len(), collection);

        self.working = snapshot.clone();
        self.original = snapshot;
        Ok(self.original.len())
    }

    /// Collection schema
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &CollectionSchema {
        self.reconciler.schema()
    }

    /// Last known persisted state
    #[inline]
    #[must_use]
    pub fn original(&self) -> &Snapshot {
        &self.original
    }

    /// State being edited
    #[inline]
    #[must_use]
    pub fn working(&self) -> &Snapshot {
        &self.working
    }

    /// Mutable access for the editing surface
    #[inline]
    pub fn working_mut(&mut self) -> &mut Snapshot {
        &mut self.working
    }

    /// Replace the whole working snapshot
    #[inline]
    pub fn replace_working(&mut self, working: Snapshot) {
        self.working = working;
    }

    /// Drop unsaved edits
    #[inline]
    pub fn discard_changes(&mut self) {
        self.working = self.original.clone();
    }

    /// Operations a save would issue now
    #[inline]
    #[must_use]
    pub fn pending_changes(&self) -> ChangeSet {
        self.reconciler.compute(&self.original, &self.working)
    }

    /// Whether a save would issue any operation
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.pending_changes().is_empty()
    }

    /// Validate, reconcile and refresh the baseline
    ///
    /// # Baseline update
    /// - `NoChanges` / `Saved`: `original` becomes a deep copy of `working`,
    ///   except that a persisted item blanked into a draft keeps its last
    ///   persisted copy, so removing it later still deletes it
    /// - `PartiallySaved`: only the successful operations are folded in
    /// - `Failed`: `original` is unchanged
    ///
    /// # Errors
    /// [`ReconcileError::Validation`] before any backend call. Per-item
    /// failures are reported in the result, not as an error.
    pub async fn save<B>(&mut self, backend: &B) -> Result<ReconciliationResult, ReconcileError>
    where
        B: ItemBackend + ?Sized,
    {
        validate_snapshot(self.reconciler.schema(), &self.working)?;

        let change_set = self.pending_changes();
        let result = self
            .reconciler
            .apply(change_set, backend, &mut self.working)
            .await;

        match result.status() {
            SaveStatus::NoChanges | SaveStatus::Saved if result.unmatched.is_empty() => {
                self.refresh_baseline();
            }
            SaveStatus::Failed => {
                tracing::warn!(
                    "Save of {} failed entirely, edits kept in memory",
                    self.schema().name
                );
            }
            _ => self.fold_persisted(&result.persisted),
        }

        Ok(result)
    }

    fn refresh_baseline(&mut self) {
        let schema = self.reconciler.schema();
        let baseline = self
            .working
            .iter()
            .filter_map(|item| match &item.id {
                Some(id) if schema.is_draft(item) => self.original.find(id).cloned(),
                _ => Some(item.clone()),
            })
            .collect();
        self.original = baseline;
    }

    fn fold_persisted(&mut self, persisted: &PersistedChanges) {
        for id in &persisted.deleted {
            self.original.remove(id);
        }

        for item in persisted.created.iter().chain(&persisted.updated) {
            let Some(id) = &item.id else { continue };
            match self.original.find_mut(id) {
                Some(existing) => *existing = item.clone(),
                None => self.original.push(item.clone()),
            }
        }
    }
}
