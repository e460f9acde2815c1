//! Exec-Ed CMS Resilient Content Store
//!
//! Keeps singleton site content (greeting, schedule, footer, ...) in a small
//! synchronous key/value medium, writing each payload to several keys so a
//! single lost or corrupted key never loses the content.
//!
//! # Core Concepts
//!
//! - [`KeyValueStorage`]: Raw string medium ([`MemoryStorage`], [`FileStorage`])
//! - [`KeyTable`]: Content type → ordered storage keys
//! - [`ResilientContentStore`]: Write-all / read-first-usable with a
//!   [`ContentChanged`] broadcast after each persisted write
//!
//! # Example
//!
//! ```rust,ignore
//! use cms_store::{MemoryStorage, ResilientContentStore};
//!
//! let store = ResilientContentStore::new(MemoryStorage::new());
//! let report = store.write("greeting", &greeting)?;
//! assert!(report.is_persisted());
//!
//! let greeting: Greeting = store.read("greeting", Greeting::default());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod file;
mod keys;
mod storage;
mod store;

pub use file::FileStorage;
pub use keys::{ContentKeySet, KeyTable, SITE_CONTENT_TYPES};
pub use storage::{KeyValueStorage, MemoryStorage, StorageError};
pub use store::{ContentChanged, ResilientContentStore, StoreError, WriteReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
