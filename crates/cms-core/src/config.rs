//! CMS configuration
//!
//! Loaded from a TOML file, then overridden from the environment.

use crate::error::ConfigError;
use cms_content::CollectionSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "EXED_CMS_CONFIG";
/// Environment override for [`CmsConfig::data_dir`]
pub const DATA_DIR_ENV: &str = "EXED_CMS_DATA_DIR";
/// Environment override for [`CmsConfig::log_filter`]
pub const LOG_FILTER_ENV: &str = "EXED_CMS_LOG";

/// Medium behind the content store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Process memory, lost on exit
    #[default]
    Memory,
    /// One file per key under `<data_dir>/content`
    File,
}

/// Backend behind collection editors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process memory, lost on exit
    #[default]
    Memory,
    /// One JSON document per collection under `<data_dir>/collections`
    File,
}

/// Content store settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Medium
    pub kind: StorageKind,
    /// Byte quota of the memory medium
    pub quota_bytes: Option<usize>,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    /// Root of file-backed data
    pub data_dir: PathBuf,
    /// Content store settings
    pub storage: StorageConfig,
    /// Collection backend
    pub backend: BackendKind,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Concurrent backend calls per save phase
    pub max_in_flight: usize,
    /// Key set overrides, content type → keys in read priority order
    pub content_keys: BTreeMap<String, Vec<String>>,
    /// Collections beyond the built-in ones
    pub collections: Vec<CollectionSchema>,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            storage: StorageConfig::default(),
            backend: BackendKind::default(),
            log_filter: "info".to_string(),
            max_in_flight: cms_reconcile::DEFAULT_MAX_IN_FLIGHT,
            content_keys: BTreeMap::new(),
            collections: Vec::new(),
        }
    }
}

impl CmsConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed TOML or unknown values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a TOML file
    ///
    /// # Errors
    /// - [`ConfigError::Io`] if the file cannot be read
    /// - [`ConfigError::Parse`] on malformed TOML
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Resolve configuration the way the binary does
    ///
    /// File from `path`, else from `EXED_CMS_CONFIG`, else defaults; then
    /// environment overrides.
    ///
    /// # Errors
    /// Propagates [`CmsConfig::from_file`] failures
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        Ok(config.with_env_overrides(|name| std::env::var(name).ok()))
    }

    /// Apply `EXED_CMS_DATA_DIR` and `EXED_CMS_LOG` through `lookup`
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(filter) = lookup(LOG_FILTER_ENV).filter(|v| !v.trim().is_empty()) {
            self.log_filter = filter;
        }
        self
    }

    /// With data directory
    #[inline]
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// With storage medium
    #[inline]
    #[must_use]
    pub fn with_storage(mut self, kind: StorageKind) -> Self {
        self.storage.kind = kind;
        self
    }

    /// With memory quota
    #[inline]
    #[must_use]
    pub fn with_quota_bytes(mut self, quota: usize) -> Self {
        self.storage.quota_bytes = Some(quota);
        self
    }

    /// With collection backend
    #[inline]
    #[must_use]
    pub fn with_backend(mut self, kind: BackendKind) -> Self {
        self.backend = kind;
        self
    }

    /// With key set override
    #[must_use]
    pub fn with_content_keys(mut self, content_type: impl Into<String>, keys: Vec<String>) -> Self {
        self.content_keys.insert(content_type.into(), keys);
        self
    }

    /// With extra collection
    #[must_use]
    pub fn with_collection(mut self, schema: CollectionSchema) -> Self {
        self.collections.push(schema);
        self
    }

    /// Directory of the file content store
    #[must_use]
    pub fn content_dir(&self) -> PathBuf {
        self.data_dir.join("content")
    }

    /// Directory of the file collection backend
    #[must_use]
    pub fn collections_dir(&self) -> PathBuf {
        self.data_dir.join("collections")
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the offending setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        if let Some((content_type, _)) = self.content_keys.iter().find(|(_, keys)| keys.is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "content_keys.{content_type} lists no keys"
            )));
        }
        for schema in &self.collections {
            if schema.name.trim().is_empty() || schema.required_field.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "collections need a name and a required_field".to_string(),
                ));
            }
        }
        Ok(())
    }
}
