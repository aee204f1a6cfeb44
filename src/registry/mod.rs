//! Lazily loaded, cached classifiers keyed by taxon or rank name.
//!
//! Keys are names with spaces replaced by `_` (`Escherichia coli` →
//! `Escherichia_coli`). The first lookup of a key loads its artifact from the
//! store; the result, including "no artifact", is cached for the rest of the
//! run. Lookups are safe from many threads.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

pub mod classifier;
pub mod model;
pub mod store;

pub use classifier::{Classifier, ClassifierError, ClassifierHandle};
pub use model::KmerModel;
pub use store::{ArtifactStore, DirectoryStore, MemoryStore};

use crate::utils::validation::{artifact_key, ValidationError};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("No classifier for '{0}'")]
    NotFound(String),

    #[error("Invalid classifier key: {0}")]
    InvalidKey(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model artifact for '{key}': {reason}")]
    InvalidArtifact { key: String, reason: String },
}

#[derive(Clone)]
enum Slot {
    Loaded(ClassifierHandle),
    Absent,
    Broken(String),
}

pub struct ClassifierRegistry {
    store: Box<dyn ArtifactStore>,
    cache: RwLock<HashMap<String, Slot>>,
}

impl ClassifierRegistry {
    pub fn new(store: impl ArtifactStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// A registry that only knows classifiers added with [`insert`](Self::insert)
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Register a ready-made classifier under `name`
    pub fn insert(&self, name: &str, model: Arc<dyn Classifier>) {
        let key = artifact_key(name);
        let handle = ClassifierHandle::new(key.clone(), model);
        self.cache.write().insert(key, Slot::Loaded(handle));
    }

    /// Load (or fetch from cache) the classifier for a taxon or rank name
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` when no artifact exists, or the
    /// store / decode error on the first failed load.
    pub fn load(&self, name: &str) -> Result<ClassifierHandle, RegistryError> {
        let key = artifact_key(name);

        let cached = self.cache.read().get(&key).cloned();
        let slot = match cached {
            Some(slot) => slot,
            None => {
                let slot = self.fetch(&key)?;
                self.cache
                    .write()
                    .entry(key.clone())
                    .or_insert(slot)
                    .clone()
            }
        };

        match slot {
            Slot::Loaded(handle) => Ok(handle),
            Slot::Absent => Err(RegistryError::NotFound(key)),
            Slot::Broken(reason) => Err(RegistryError::InvalidArtifact { key, reason }),
        }
    }

    /// True if a classifier exists for `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.load(name).is_ok()
    }

    /// Number of keys looked up so far, found or not
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }

    fn fetch(&self, key: &str) -> Result<Slot, RegistryError> {
        let Some(blob) = self.store.fetch(key)? else {
            debug!(key, "No classifier artifact");
            return Ok(Slot::Absent);
        };

        match KmerModel::from_slice(&blob) {
            Ok(model) => {
                debug!(key, labels = model.labels.len(), "Loaded classifier");
                Ok(Slot::Loaded(ClassifierHandle::new(key, Arc::new(model))))
            }
            Err(reason) => {
                warn!(key, %reason, "Invalid classifier artifact");
                Ok(Slot::Broken(reason))
            }
        }
    }
}

impl std::fmt::Debug for ClassifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierRegistry")
            .field("cached", &self.cached())
            .finish_non_exhaustive()
    }
}
