//! Collection items and their field values

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-assigned item identifier
///
/// Opaque to the editor: only compared, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap a backend identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scalar value of an item attribute
///
/// Serialized as a bare JSON scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean flag (e.g. `featured`)
    Bool(bool),

    /// Numeric value (e.g. `credits`), integers stay integers
    Number(serde_json::Number),

    /// Free text
    Text(String),
}

impl FieldValue {
    /// Empty text value
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    /// Text that is empty after trimming
    ///
    /// Numbers and booleans are never blank.
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }

    /// Borrow as text, if this is a text value
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Non-finite numbers have no JSON form and become empty text.
impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value).map_or_else(Self::empty, Self::Number)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Attribute name → value, in editing order
pub type Fields = IndexMap<String, FieldValue>;

/// One editable entry of a collection
///
/// Serialized flat: `{"id": "a1", "order": 0, "name": "Kim", ...}`.
/// `id` is omitted for items the backend has not seen yet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionItem {
    /// Backend identity, absent until first persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,

    /// Display position
    #[serde(default)]
    pub order: i64,

    /// Editable content
    #[serde(flatten)]
    pub fields: Fields,
}

impl CollectionItem {
    /// Create empty, unidentified item
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With identity
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// With field value (replaces an existing value in place)
    #[inline]
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// With display position
    #[inline]
    #[must_use]
    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Whether the backend has assigned an identity
    #[inline]
    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.id.is_some()
    }

    /// Field value by name
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Set or replace a field value
    #[inline]
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Compare tracked content (all fields plus `order`), ignoring identity
    ///
    /// Field order does not matter; values compare by value.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.order == other.order
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(name, value)| other.fields.get(name) == Some(value))
    }
}
