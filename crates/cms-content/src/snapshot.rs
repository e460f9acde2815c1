//! Ordered point-in-time views of a collection

use crate::item::{CollectionItem, ItemId};
use crate::validation::ContentError;
use serde::{Deserialize, Serialize};

/// Ordered sequence of items
///
/// Used both as the last persisted state (`original`) and as the state the
/// editor is changing (`working`). Cloning is a deep copy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    items: Vec<CollectionItem>,
}

impl Snapshot {
    /// Empty snapshot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of items
    ///
    /// # Errors
    /// Returns [`ContentError::Parse`] on malformed JSON or non-scalar fields.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        serde_json::from_str(json).map_err(ContentError::Parse)
    }

    /// Serialize as a pretty JSON array
    ///
    /// # Errors
    /// Returns [`ContentError::Parse`] if a value cannot be represented.
    pub fn to_json_pretty(&self) -> Result<String, ContentError> {
        serde_json::to_string_pretty(self).map_err(ContentError::Parse)
    }

    /// Items in snapshot order
    #[inline]
    #[must_use]
    pub fn items(&self) -> &[CollectionItem] {
        &self.items
    }

    /// Iterate items
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, CollectionItem> {
        self.items.iter()
    }

    /// Iterate items mutably
    #[inline]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, CollectionItem> {
        self.items.iter_mut()
    }

    /// Append item
    #[inline]
    pub fn push(&mut self, item: CollectionItem) {
        self.items.push(item);
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the snapshot has no items
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find item by identity
    #[must_use]
    pub fn find(&self, id: &ItemId) -> Option<&CollectionItem> {
        self.items.iter().find(|item| item.id.as_ref() == Some(id))
    }

    /// Find item by identity, mutably
    pub fn find_mut(&mut self, id: &ItemId) -> Option<&mut CollectionItem> {
        self.items.iter_mut().find(|item| item.id.as_ref() == Some(id))
    }

    /// Whether any item carries this identity
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.find(id).is_some()
    }

    /// Remove the item with this identity, returning it
    pub fn remove(&mut self, id: &ItemId) -> Option<CollectionItem> {
        let pos = self
            .items
            .iter()
            .position(|item| item.id.as_ref() == Some(id))?;
        Some(self.items.remove(pos))
    }

    /// Identities in snapshot order
    pub fn identities(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter().filter_map(|item| item.id.as_ref())
    }

    /// Stable sort by display position
    #[inline]
    pub fn sort_by_order(&mut self) {
        self.items.sort_by_key(|item| item.order);
    }

    /// Unwrap into items
    #[inline]
    #[must_use]
    pub fn into_items(self) -> Vec<CollectionItem> {
        self.items
    }
}

impl From<Vec<CollectionItem>> for Snapshot {
    fn from(items: Vec<CollectionItem>) -> Self {
        Self { items }
    }
}

impl FromIterator<CollectionItem> for Snapshot {
    fn from_iter<I: IntoIterator<Item = CollectionItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a CollectionItem;
    type IntoIter = std::slice::Iter<'a, CollectionItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Snapshot {
        Snapshot::from(vec![
            CollectionItem::new().with_id("b").with_field("name", "Lee").with_order(2),
            CollectionItem::new().with_id("a").with_field("name", "Kim").with_order(0),
            CollectionItem::new().with_field("name", "Park").with_order(1),
        ])
    }

    #[test]
    fn find_and_remove_by_identity() {
        let mut snapshot = sample();
        let id = ItemId::from("a");

        assert!(snapshot.contains(&id));
        let removed = snapshot.remove(&id).unwrap();
        assert_eq!(removed.order, 0);
        assert!(!snapshot.contains(&id));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn identities_skip_unsaved_items() {
        let snapshot = sample();
        let ids: Vec<_> = snapshot.identities().map(ItemId::as_str).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn sort_by_order() {
        let mut snapshot = sample();
        snapshot.sort_by_order();
        let orders: Vec<_> = snapshot.iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn clone_is_deep() {
        let original = sample();
        let mut working = original.clone();
        working.iter_mut().next().unwrap().set_field("name", "Changed");

        assert_ne!(original, working);
    }

    #[test]
    fn from_json_rejects_nested_values() {
        let err = Snapshot::from_json(r#"[{"name": {"first": "Kim"}}]"#).unwrap_err();
        assert!(matches!(err, ContentError::Parse(_)));
    }
}
