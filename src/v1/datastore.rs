use std::{collections::BTreeMap, io, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::{
    plan::ResourceItem,
    registry::{Registry, RegistryError, ResourceType},
    storage::file::FileStorage,
};

/// Raw state as persisted: address to encoded [`StateEntry`].
pub type Entries = BTreeMap<String, Vec<u8>>;

pub trait Storage {
    fn load(&self) -> Result<Entries, DatastoreError>;
    fn save(&self, entries: &Entries) -> Result<(), DatastoreError>;
}

/// Stored next to the resource so it can be decoded without the plan that
/// declared it.
#[derive(Serialize, Deserialize)]
struct StateEntry {
    resource_type: ResourceType,
    resource: Value,
}

/// Last known state of every managed resource, keyed by address.
pub struct Datastore {
    entries: Entries,
    storage: Box<dyn Storage + Send + Sync>,
}

impl Default for Datastore {
    fn default() -> Self {
        Self::new(FileStorage::default())
    }
}

impl Datastore {
    pub fn new(storage: impl Storage + Send + Sync + 'static) -> Self {
        Self {
            entries: Entries::new(),
            storage: Box::new(storage),
        }
    }

    /// Replaces the in-memory state with what the storage holds.
    pub fn reload(&mut self) -> Result<(), DatastoreError> {
        info!("--- Loading state ---");
        self.entries = self
            .storage
            .load()
            .map_err(|e| DatastoreError::LoadError(e.to_string()))?;
        debug!("{} resources in state", self.entries.len());
        Ok(())
    }

    pub fn save(&self) -> Result<(), DatastoreError> {
        info!("--- Saving state ---");
        self.storage.save(&self.entries)
    }

    pub fn record(
        &mut self,
        registry: &Registry,
        resource: &dyn ResourceItem,
    ) -> Result<(), DatastoreError> {
        let entry = StateEntry {
            resource_type: resource.resource_type(),
            resource: registry.encode(resource)?,
        };
        let address = resource.id();
        debug!("Recording Resource[{}]", address);
        self.entries.insert(address, serde_json::to_vec(&entry)?);
        Ok(())
    }

    pub fn lookup(
        &self,
        registry: &Registry,
        address: &str,
    ) -> Result<Option<Arc<dyn ResourceItem>>, DatastoreError> {
        let bytes = match self.entries.get(address) {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let entry: StateEntry = serde_json::from_slice(bytes)?;
        Ok(Some(registry.decode(&entry.resource_type, entry.resource)?))
    }

    pub fn forget(&mut self, address: &str) {
        if self.entries.remove(address).is_some() {
            debug!("Forgot Resource[{}]", address);
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    /// Every recorded address, in ascending order.
    pub fn addresses(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("Could not load state: {0}")]
    LoadError(String),
    #[error("State file error: {0}")]
    IOError(#[from] io::Error),
    #[error("Invalid state file: {0}")]
    BincodeError(#[from] bincode::Error),
    #[error("Invalid state entry: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Registry error: {0}")]
    RegistryError(#[from] RegistryError),
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Fixed(Mutex<Entries>);

    impl Storage for Arc<Fixed> {
        fn load(&self) -> Result<Entries, DatastoreError> {
            Ok(self.0.lock().unwrap().clone())
        }
        fn save(&self, entries: &Entries) -> Result<(), DatastoreError> {
            *self.0.lock().unwrap() = entries.clone();
            Ok(())
        }
    }

    struct Failing;

    impl Storage for Failing {
        fn load(&self) -> Result<Entries, DatastoreError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied").into())
        }
        fn save(&self, _entries: &Entries) -> Result<(), DatastoreError> {
            Ok(())
        }
    }

    #[test]
    fn reload_replaces_entries_and_forget_is_saved() {
        let storage = Arc::new(Fixed::default());
        storage
            .0
            .lock()
            .unwrap()
            .extend([("b".to_string(), vec![]), ("a".to_string(), vec![])]);

        let mut datastore = Datastore::new(storage.clone());
        datastore.reload().unwrap();
        assert_eq!(datastore.addresses(), vec!["a", "b"]);

        datastore.forget("a");
        datastore.forget("missing");
        datastore.save().unwrap();
        assert!(!datastore.contains("a"));
        assert_eq!(storage.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn lookup_of_unknown_address_is_none() {
        let datastore = Datastore::new(Arc::new(Fixed::default()));
        assert!(datastore
            .lookup(&Registry::default(), "nomad/AclPolicy/x")
            .unwrap()
            .is_none());
    }

    #[test]
    fn load_failures_are_reported() {
        let mut datastore = Datastore::new(Failing);
        let err = datastore.reload().unwrap_err();
        assert_eq!(err.to_string(), "Could not load state: State file error: denied");
    }
}
