//! Content-type → storage-key table
//!
//! The one place key names live, so every fallback chain can be audited
//! without reading call sites.

use std::collections::BTreeMap;

/// Content types the marketing site renders
pub const SITE_CONTENT_TYPES: &[&str] = &[
    "greeting",
    "faculty",
    "schedule",
    "gallery",
    "admissions",
    "footer",
    "benefits",
    "professors",
];

/// Ordered storage keys of one content type
///
/// Earlier keys win on read; writes go to every key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentKeySet {
    content_type: String,
    keys: Vec<String>,
}

impl ContentKeySet {
    /// Create key set
    #[inline]
    #[must_use]
    pub fn new(content_type: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            content_type: content_type.into(),
            keys,
        }
    }

    /// Primary, backup and legacy key for a content type
    #[must_use]
    pub fn standard(content_type: &str) -> Self {
        Self::new(
            content_type,
            vec![
                format!("content.{content_type}"),
                format!("content.{content_type}.backup"),
                format!("legacy.{content_type}Content"),
            ],
        )
    }

    /// Logical content type
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Keys in read priority order
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// Static table of all key sets
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyTable {
    sets: BTreeMap<String, ContentKeySet>,
}

impl KeyTable {
    /// Empty table
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Standard key sets for every site content type
    #[must_use]
    pub fn site_defaults() -> Self {
        let mut table = Self::empty();
        for content_type in SITE_CONTENT_TYPES {
            table.insert(ContentKeySet::standard(content_type));
        }
        table
    }

    /// Add or replace a key set
    ///
    /// A key set without keys is ignored.
    pub fn insert(&mut self, set: ContentKeySet) {
        if set.keys.is_empty() {
            tracing::warn!("Ignoring empty key set for {}", set.content_type);
            return;
        }
        self.sets.insert(set.content_type.clone(), set);
    }

    /// Apply configured overrides (`content type → keys`)
    #[must_use]
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, Vec<String>>) -> Self {
        for (content_type, keys) in overrides {
            self.insert(ContentKeySet::new(content_type.clone(), keys.clone()));
        }
        self
    }

    /// Key set of a content type
    #[inline]
    #[must_use]
    pub fn get(&self, content_type: &str) -> Option<&ContentKeySet> {
        self.sets.get(content_type)
    }

    /// All key sets, sorted by content type
    pub fn iter(&self) -> impl Iterator<Item = &ContentKeySet> {
        self.sets.values()
    }

    /// Number of content types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether the table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
