//! Exec-Ed CMS Collection Reconciliation
//!
//! Saves edited collections (faculty, benefits, professors) to a backend
//! that only knows per-item create, update and delete.
//!
//! # Core Concepts
//!
//! - [`ChangeSet`]: Created / updated / deleted items between two snapshots
//! - [`compute_change_set`]: Snapshot diff, drafts excluded
//! - [`ItemBackend`]: Per-item persistence trait
//! - [`Reconciler`]: Phased application (delete → create → update) with
//!   per-item failure isolation and identity write-back
//! - [`CollectionEditor`]: Original/working pair with baseline bookkeeping
//!
//! # Example
//!
//! ```rust,ignore
//! use cms_content::CollectionSchema;
//! use cms_reconcile::{CollectionEditor, MemoryBackend, SaveStatus};
//!
//! let backend = MemoryBackend::new();
//! let mut editor = CollectionEditor::new(CollectionSchema::faculty());
//! editor.load(&backend).await?;
//!
//! editor.working_mut().push(item);
//! let result = editor.save(&backend).await?;
//! assert_eq!(result.status(), SaveStatus::Saved);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod backend;
mod change_set;
mod editor;
mod reconciler;

pub use backend::{BackendError, ItemBackend, MemoryBackend};
pub use change_set::{compute_change_set, ChangeSet};
pub use editor::{CollectionEditor, ReconcileError};
pub use reconciler::{
    ItemFailure, Operation, PersistedChanges, ReconciliationResult, Reconciler, SaveStatus,
    DEFAULT_MAX_IN_FLIGHT,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
