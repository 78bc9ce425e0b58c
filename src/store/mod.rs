pub mod disk;
pub mod memory;

use crate::core::cache::{KeyValueCollection, Store};
use anyhow::{Context, Result};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::debug;

/// A thread-safe key-value store that can hold multiple collections.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    /// Opens a store whose persistent collections live under `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open data store at {}", path.display()))?;
        debug!("Opened data store at {}", path.display());

        Ok(Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: Some(keyspace),
        })
    }

    /// A store with no disk backing; persistent collections are unavailable.
    #[cfg(test)]
    pub(crate) fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: None,
        }
    }
}

impl Store for KeyValueStore {
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>> {
        if let Some(collection) = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Some(Arc::clone(collection));
        }

        if !create_if_missing {
            return None;
        }

        let new_collection: Arc<dyn KeyValueCollection> = if persist {
            let keyspace = self.keyspace.as_ref()?;
            match keyspace.open_partition(name, PartitionCreateOptions::default()) {
                Ok(partition) => Arc::new(DiskCollection::new(keyspace.clone(), partition)),
                Err(e) => {
                    debug!("Failed to open partition {}: {}", name, e);
                    return None;
                }
            }
        } else {
            Arc::new(MemoryCollection::new())
        };

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Some(Arc::clone(
            collections.entry(name.to_string()).or_insert(new_collection),
        ))
    }
}
