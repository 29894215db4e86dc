//! Durable registered-nickname store.
//!
//! The full set is serialized as a JSON array of strings, read in full at
//! startup and rewritten in full on every addition. Writes go to a sibling
//! temp file first and rename over the target, so a crash mid-write never
//! truncates the registry.

use crate::error::StorageError;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File-backed store of every nickname ever registered.
#[derive(Debug, Clone)]
pub struct RegisteredStore {
    path: PathBuf,
}

impl RegisteredStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted set.
    ///
    /// A missing file yields an empty set; an unreadable or corrupt file
    /// yields an empty set with a warning. Startup never fails on bad
    /// registry state.
    pub fn load(&self) -> BTreeSet<String> {
        match self.try_load() {
            Ok(set) => set,
            Err(StorageError::Io { ref source, .. }) if source.kind() == ErrorKind::NotFound => {
                BTreeSet::new()
            }
            Err(e) => {
                tracing::warn!("ignoring unusable registry file: {e}");
                BTreeSet::new()
            }
        }
    }

    fn try_load(&self) -> Result<BTreeSet<String>, StorageError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        let names: Vec<String> =
            serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(names.into_iter().collect())
    }

    /// Rewrite the full set durably.
    pub fn persist(&self, set: &BTreeSet<String>) -> Result<(), StorageError> {
        let names: Vec<&String> = set.iter().collect();
        let body = serde_json::to_string_pretty(&names).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = RegisteredStore::new(dir.path().join("registered.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registered.json");
        fs::write(&path, "{ not json ]").unwrap();
        let store = RegisteredStore::new(&path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn persisted_set_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registered.json");
        let store = RegisteredStore::new(&path);

        let mut set = BTreeSet::new();
        set.insert("alice".to_string());
        set.insert("bob".to_string());
        store.persist(&set).unwrap();

        // A fresh store over the same path sees the same set, the way a
        // restarted server would.
        let reloaded = RegisteredStore::new(&path).load();
        assert_eq!(reloaded, set);
    }

    #[test]
    fn persist_rewrites_in_full() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registered.json");
        let store = RegisteredStore::new(&path);

        let mut set = BTreeSet::new();
        set.insert("alice".to_string());
        store.persist(&set).unwrap();
        set.insert("bob".to_string());
        store.persist(&set).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let names: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(names, vec!["alice".to_string(), "bob".to_string()]);
    }
}
