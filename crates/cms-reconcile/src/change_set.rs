//! Change-set computation
//!
//! Diffs the last persisted snapshot against the edited one and produces the
//! per-item operations a create/update/delete backend needs.

use cms_content::{CollectionItem, CollectionSchema, ItemId, Snapshot};
use std::collections::HashSet;

/// Operations converging the backend on the working snapshot
///
/// The three lists are disjoint. `created` and `updated` follow working
/// order, `deleted` follows original order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeSet {
    /// Items without identity
    pub created: Vec<CollectionItem>,

    /// Identified items whose fields or order changed
    pub updated: Vec<CollectionItem>,

    /// Identified items no longer present in the working snapshot
    pub deleted: Vec<CollectionItem>,
}

impl ChangeSet {
    /// No operation to perform
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of backend operations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

/// Compute the change set between two snapshots
///
/// Drafts (blank required field) never produce an operation. An identified
/// item that became a draft is kept remotely as it was: deletion only
/// considers identities missing from the whole working snapshot.
///
/// Identified working items unknown to `original` count as updated, since
/// they exist remotely and have no persisted baseline to compare against.
#[must_use]
pub fn compute_change_set(
    schema: &CollectionSchema,
    original: &Snapshot,
    working: &Snapshot,
) -> ChangeSet {
    let mut change_set = ChangeSet::default();

    for item in working.iter().filter(|item| !schema.is_draft(item)) {
        let Some(id) = &item.id else {
            change_set.created.push(item.clone());
            continue;
        };

        let baseline = original
            .find(id)
            .filter(|previous| !schema.is_draft(previous));

        match baseline {
            Some(previous) if previous.same_content(item) => {}
            _ => change_set.updated.push(item.clone()),
        }
    }

    let working_ids: HashSet<&ItemId> = working.identities().collect();
    change_set.deleted = original
        .iter()
        .filter(|item| !schema.is_draft(item))
        .filter(|item| item.id.as_ref().is_some_and(|id| !working_ids.contains(id)))
        .cloned()
        .collect();

    tracing::debug!(
        "Change set for {}: {} created, {} updated, {} deleted",
        schema.name,
        change_set.created.len(),
        change_set.updated.len(),
        change_set.deleted.len()
    );

    change_set
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kim(order: i64) -> CollectionItem {
        CollectionItem::new()
            .with_id("a1")
            .with_field("name", "Kim")
            .with_order(order)
    }

    #[test]
    fn identical_snapshots_yield_nothing() {
        let schema = CollectionSchema::faculty();
        let original = Snapshot::from(vec![kim(0)]);
        let working = original.clone();

        assert!(compute_change_set(&schema, &original, &working).is_empty());
        assert!(compute_change_set(&schema, &original, &original).is_empty());
    }

    #[test]
    fn order_change_and_new_item() {
        let schema = CollectionSchema::faculty();
        let original = Snapshot::from(vec![kim(0)]);
        let lee = CollectionItem::new().with_field("name", "Lee").with_order(2);
        let working = Snapshot::from(vec![kim(1), lee.clone()]);

        let change_set = compute_change_set(&schema, &original, &working);

        assert_eq!(change_set.updated, vec![kim(1)]);
        assert_eq!(change_set.created, vec![lee]);
        assert!(change_set.deleted.is_empty());
    }

    #[test]
    fn removed_item_is_deleted() {
        let schema = CollectionSchema::faculty();
        let lee = CollectionItem::new().with_id("b2").with_field("name", "Lee");
        let original = Snapshot::from(vec![kim(0), lee.clone()]);
        let working = Snapshot::from(vec![kim(0)]);

        let change_set = compute_change_set(&schema, &original, &working);
        assert_eq!(change_set.deleted, vec![lee]);
        assert_eq!(change_set.len(), 1);
    }

    #[test]
    fn drafts_are_neither_created_nor_deleted() {
        let schema = CollectionSchema::faculty();
        let original = Snapshot::from(vec![kim(0)]);
        let working = Snapshot::from(vec![
            kim(0).with_field("name", "  "),
            CollectionItem::new().with_field("name", ""),
        ]);

        assert!(compute_change_set(&schema, &original, &working).is_empty());
    }

    #[test]
    fn unknown_identity_is_updated() {
        let schema = CollectionSchema::faculty();
        let working = Snapshot::from(vec![kim(0)]);

        let change_set = compute_change_set(&schema, &Snapshot::new(), &working);
        assert_eq!(change_set.updated, vec![kim(0)]);
    }

    #[test]
    fn deleted_follows_original_order() {
        let schema = CollectionSchema::benefits();
        let original: Snapshot = ["x", "y", "z"]
            .into_iter()
            .map(|id| CollectionItem::new().with_id(id).with_field("title", id))
            .collect();

        let change_set = compute_change_set(&schema, &original, &Snapshot::new());
        let ids: Vec<_> = change_set
            .deleted
            .iter()
            .filter_map(|item| item.id.as_ref().map(ItemId::as_str))
            .collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }
}
