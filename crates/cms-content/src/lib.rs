//! Exec-Ed CMS Content Model
//!
//! Identity-bearing collection items and the snapshots editors compare when
//! saving a collection.
//!
//! # Core Concepts
//!
//! - [`CollectionItem`]: One editable entry (faculty member, benefit, professor)
//! - [`Snapshot`]: Ordered point-in-time view of a collection
//! - [`CollectionSchema`]: Required field and natural key of a collection
//! - [`NaturalKey`]: Non-identity values used to correlate unsaved items
//! - [`validate_snapshot`]: Checks run before any backend call
//!
//! # Example
//!
//! ```rust
//! use cms_content::{CollectionItem, CollectionSchema, Snapshot};
//!
//! let schema = CollectionSchema::faculty();
//! let snapshot = Snapshot::from(vec![
//!     CollectionItem::new().with_id("a1").with_field("name", "Kim"),
//!     CollectionItem::new().with_field("name", "").with_order(1),
//! ]);
//!
//! // Blank required field marks the second item as a draft
//! assert!(!schema.is_draft(&snapshot.items()[0]));
//! assert!(schema.is_draft(&snapshot.items()[1]));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod item;
mod schema;
mod snapshot;
mod validation;

pub use item::{CollectionItem, FieldValue, Fields, ItemId};
pub use schema::{builtin_schemas, CollectionSchema, NaturalKey};
pub use snapshot::Snapshot;
pub use validation::{validate_snapshot, ContentError, ValidationError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
