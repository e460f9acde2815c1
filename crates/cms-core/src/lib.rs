//! Exec-Ed CMS Core
//!
//! Configuration, the file-backed collection backend and the service facade
//! combining collection reconciliation with the resilient content store.
//!
//! # Core Concepts
//!
//! - [`CmsConfig`]: TOML configuration with environment overrides
//! - [`JsonFileBackend`]: One JSON document per collection
//! - [`CmsService`]: Collections and site content behind one handle
//!
//! # Example
//!
//! ```rust,ignore
//! use cms_core::{CmsConfig, CmsService};
//!
//! let config = CmsConfig::load(None)?;
//! let service = CmsService::from_config(&config).await?;
//!
//! let faculty = service.list_collection("faculty").await?;
//! let greeting: serde_json::Value = service.read_content("greeting", serde_json::Value::Null);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod error;
mod file_backend;
mod service;

pub use config::{
    BackendKind, CmsConfig, StorageConfig, StorageKind, CONFIG_PATH_ENV, DATA_DIR_ENV,
    LOG_FILTER_ENV,
};
pub use error::{CmsError, ConfigError};
pub use file_backend::JsonFileBackend;
pub use service::{CmsService, SharedStorage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
