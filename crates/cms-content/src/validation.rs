//! Pre-save validation
//!
//! Runs before any backend call so a rejected snapshot costs nothing
//! remotely.

use crate::item::ItemId;
use crate::schema::CollectionSchema;
use crate::snapshot::Snapshot;
use std::collections::HashSet;

/// Snapshot rejected before reconciliation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Two items carry the same backend identity
    #[error("duplicate identity '{id}' in collection '{collection}'")]
    DuplicateIdentity {
        /// Collection name
        collection: String,
        /// Repeated identity
        id: ItemId,
    },

    /// Two unsaved items share a natural key
    ///
    /// Created identities could not be written back unambiguously, so the
    /// editor has to tell the items apart first.
    #[error("new items in collection '{collection}' share natural key '{key}'")]
    AmbiguousNaturalKey {
        /// Collection name
        collection: String,
        /// Shared key, rendered
        key: String,
    },
}

/// Errors reading or writing content values
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// JSON could not be parsed or produced
    #[error("content parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// Snapshot failed validation
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Check a working snapshot before saving
///
/// Drafts (blank required field) are ignored for the natural-key check since
/// they are never sent to the backend.
///
/// # Errors
/// - [`ValidationError::DuplicateIdentity`] if an identity repeats
/// - [`ValidationError::AmbiguousNaturalKey`] if unsaved non-draft items collide
pub fn validate_snapshot(
    schema: &CollectionSchema,
    snapshot: &Snapshot,
) -> Result<(), ValidationError> {
    let mut seen_ids = HashSet::new();
    for id in snapshot.identities() {
        if !seen_ids.insert(id) {
            return Err(ValidationError::DuplicateIdentity {
                collection: schema.name.clone(),
                id: id.clone(),
            });
        }
    }

    let mut new_keys = HashSet::new();
    for item in snapshot.iter() {
        if item.has_identity() || schema.is_draft(item) {
            continue;
        }
        let key = schema.natural_key_of(item);
        if new_keys.contains(&key) {
            return Err(ValidationError::AmbiguousNaturalKey {
                collection: schema.name.clone(),
                key: key.to_string(),
            });
        }
        new_keys.insert(key);
    }

    Ok(())
}
