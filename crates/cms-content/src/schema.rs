//! Collection schemas and natural keys

use crate::item::{CollectionItem, FieldValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of one editable collection
///
/// Only the parts reconciliation needs: which field makes an item
/// non-draft, and which fields identify an item without backend identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Backend collection name
    pub name: String,

    /// Field that must be non-blank for an item to be saved
    pub required_field: String,

    /// Fields correlating unsaved items, in key order; empty means the
    /// required field alone
    #[serde(default)]
    pub natural_key: Vec<String>,
}

impl CollectionSchema {
    /// Create schema whose natural key is the required field alone
    #[must_use]
    pub fn new(name: impl Into<String>, required_field: impl Into<String>) -> Self {
        let required_field = required_field.into();
        Self {
            name: name.into(),
            natural_key: vec![required_field.clone()],
            required_field,
        }
    }

    /// With explicit natural-key fields
    #[must_use]
    pub fn with_natural_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.natural_key = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Faculty bios: correlated by name, term and category
    #[must_use]
    pub fn faculty() -> Self {
        Self::new("faculty", "name").with_natural_key(["name", "term", "category"])
    }

    /// Program benefit entries
    #[must_use]
    pub fn benefits() -> Self {
        Self::new("benefits", "title")
    }

    /// Professor directory
    #[must_use]
    pub fn professors() -> Self {
        Self::new("professors", "name").with_natural_key(["name", "department"])
    }

    /// Item is an incomplete draft (required field missing or blank)
    #[inline]
    #[must_use]
    pub fn is_draft(&self, item: &CollectionItem) -> bool {
        item.field(&self.required_field)
            .map_or(true, FieldValue::is_blank)
    }

    /// Natural key of an item under this schema
    ///
    /// Missing fields contribute an empty text value.
    #[must_use]
    pub fn natural_key_of(&self, item: &CollectionItem) -> NaturalKey {
        let value_of = |name: &String| item.field(name).cloned().unwrap_or_else(FieldValue::empty);
        if self.natural_key.is_empty() {
            return NaturalKey(vec![value_of(&self.required_field)]);
        }
        NaturalKey(self.natural_key.iter().map(value_of).collect())
    }
}

/// Schemas of the collections the admin panel edits
#[must_use]
pub fn builtin_schemas() -> Vec<CollectionSchema> {
    vec![
        CollectionSchema::faculty(),
        CollectionSchema::benefits(),
        CollectionSchema::professors(),
    ]
}

/// Ordered natural-key values of one item
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey(Vec<FieldValue>);

impl NaturalKey {
    /// Key values in schema order
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[FieldValue] {
        &self.0
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" / ")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_detection() {
        let schema = CollectionSchema::faculty();

        assert!(schema.is_draft(&CollectionItem::new()));
        assert!(schema.is_draft(&CollectionItem::new().with_field("name", "  ")));
        assert!(!schema.is_draft(&CollectionItem::new().with_field("name", "Kim")));
    }

    #[test]
    fn natural_key_fills_missing_fields() {
        let schema = CollectionSchema::faculty();
        let item = CollectionItem::new()
            .with_field("name", "Kim")
            .with_field("category", "Finance");

        let key = schema.natural_key_of(&item);
        assert_eq!(key.values().len(), 3);
        assert_eq!(key.values()[1], FieldValue::empty());
        assert_eq!(key.to_string(), "Kim /  / Finance");
    }

    #[test]
    fn natural_key_ignores_non_key_fields() {
        let schema = CollectionSchema::benefits();
        let a = CollectionItem::new()
            .with_field("title", "Alumni network")
            .with_field("body", "one");
        let b = CollectionItem::new()
            .with_field("title", "Alumni network")
            .with_field("body", "two");

        assert_eq!(schema.natural_key_of(&a), schema.natural_key_of(&b));
    }

    #[test]
    fn schema_deserializes_with_default_key() {
        let schema: CollectionSchema =
            serde_json::from_str(r#"{"name": "gallery", "required_field": "src"}"#).unwrap();
        assert!(schema.natural_key.is_empty());
        assert_eq!(schema.required_field, "src");

        let item = CollectionItem::new().with_field("src", "hall.jpg");
        assert_eq!(schema.natural_key_of(&item).to_string(), "hall.jpg");
    }

    #[test]
    fn builtin_schema_names() {
        let names: Vec<_> = builtin_schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["faculty", "benefits", "professors"]);
    }
}
