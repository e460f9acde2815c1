//! Directory-backed storage, one JSON file per key

use crate::storage::{KeyValueStorage, StorageError};
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Storage keeping each key in `<dir>/<key>.json`
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash never leaves a half-written value behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory
    ///
    /// # Errors
    /// [`StorageError::Io`] if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::io_error(&dir, e))?;
        Ok(Self { dir })
    }

    /// Storage directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `key`
    ///
    /// Bytes outside `[A-Za-z0-9._-]` are written as `%XX`, so distinct keys
    /// always map to distinct files.
    ///
    /// # Errors
    /// [`StorageError::InvalidKey`] for empty keys or keys made only of dots
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.chars().all(|c| c == '.') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let mut file_name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
                file_name.push(char::from(byte));
            } else {
                let _ = write!(file_name, "%{byte:02X}");
            }
        }

        Ok(self.dir.join(format!("{file_name}.json")))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io_error(path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, value).map_err(|e| StorageError::io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::io_error(&path, e))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io_error(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        storage.set("content.greeting", r#"{"title":"Welcome"}"#).unwrap();
        assert_eq!(
            storage.get("content.greeting").unwrap().as_deref(),
            Some(r#"{"title":"Welcome"}"#)
        );
        assert!(dir.path().join("content.greeting.json").exists());
        assert!(!dir.path().join("content.greeting.json.tmp").exists());
    }

    #[test]
    fn missing_key_is_none_and_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        assert_eq!(storage.get("nothing").unwrap(), None);
        storage.remove("nothing").unwrap();
    }

    #[test]
    fn keys_are_percent_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        let path = storage.path_for("../etc/passwd").unwrap();
        assert_eq!(path, dir.path().join("..%2Fetc%2Fpasswd.json"));
        assert!(matches!(
            storage.path_for(".."),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn similar_keys_use_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        storage.set("content/greeting", "\"slash\"").unwrap();
        storage.set("content_greeting", "\"underscore\"").unwrap();
        storage.set("content%2Fgreeting", "\"escaped\"").unwrap();

        assert_eq!(storage.get("content/greeting").unwrap().as_deref(), Some("\"slash\""));
        assert_eq!(
            storage.get("content_greeting").unwrap().as_deref(),
            Some("\"underscore\"")
        );
        assert_eq!(
            storage.get("content%2Fgreeting").unwrap().as_deref(),
            Some("\"escaped\"")
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn open_creates_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let storage = FileStorage::open(&nested).unwrap();
        assert!(storage.dir().is_dir());
    }
}
