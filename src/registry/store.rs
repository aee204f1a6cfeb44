use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::RegistryError;
use crate::utils::validation::validate_key;

/// Suffix of model artifacts in a directory store
pub const MODEL_SUFFIX: &str = "_model.json";

/// Source of classifier blobs, keyed by artifact key
pub trait ArtifactStore: Send + Sync {
    /// Fetch the blob for `key`; `Ok(None)` when no artifact exists
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` when the key is invalid or the blob cannot be read.
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, RegistryError>;
}

/// Artifacts stored as `<key>_model.json` (or `.json.gz`) in one directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// # Errors
    ///
    /// Returns `RegistryError::Io` if `root` is not a readable directory.
    pub fn open(root: &Path) -> Result<Self, RegistryError> {
        if !root.is_dir() {
            return Err(RegistryError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("model directory not found: {}", root.display()),
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, key: &str) -> [PathBuf; 2] {
        [
            self.root.join(format!("{key}{MODEL_SUFFIX}")),
            self.root.join(format!("{key}{MODEL_SUFFIX}.gz")),
        ]
    }
}

impl ArtifactStore for DirectoryStore {
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        validate_key(key)?;
        for path in self.candidates(key) {
            if path.is_file() {
                return Ok(Some(std::fs::read(&path)?));
            }
        }
        Ok(None)
    }
}

/// In-memory artifacts
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, blob: Vec<u8>) {
        self.blobs.write().insert(key.into(), blob);
    }
}

impl ArtifactStore for MemoryStore {
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, RegistryError> {
        validate_key(key)?;
        Ok(self.blobs.read().get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_store_fetch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("phylum_model.json"), b"{}").unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();

        assert_eq!(store.fetch("phylum").unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.fetch("class").unwrap(), None);
    }

    #[test]
    fn test_directory_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.fetch("../phylum"),
            Err(RegistryError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_directory_store_missing_root() {
        assert!(DirectoryStore::open(Path::new("/nonexistent/models")).is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.insert("Bacillus", b"blob".to_vec());

        assert_eq!(store.fetch("Bacillus").unwrap(), Some(b"blob".to_vec()));
        assert_eq!(store.fetch("Escherichia").unwrap(), None);
    }
}
