use std::{
    collections::{hash_map::Entry, HashMap},
    fmt,
    sync::Arc,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{
    manager::ResourceManager,
    plan::ResourceItem,
    resource::{Resource, SharedResource},
};

/// Kind of a managed object, e.g. `nomad/AclPolicy`.
///
/// Carries no region: ACL policies are replicated cluster-wide, so moving a
/// provider to another region must not change where its state lives.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct ResourceType {
    pub provider: String,
    pub kind: String,
}

impl ResourceType {
    pub fn new(provider: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            kind: kind.into(),
        }
    }

    /// Datastore key of a resource declared under `name`.
    pub fn address(&self, name: &str) -> String {
        format!("{}/{}", self, name)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.kind)
    }
}

trait ResourceCodec: Send + Sync {
    fn encode(&self, item: &dyn ResourceItem) -> Result<Value, RegistryError>;
    fn decode(&self, value: Value) -> Result<Arc<dyn ResourceItem>, RegistryError>;
}

/// Codec for one `(Input, Output)` pair. Decoded resources get `manager`
/// attached, since managers never reach the datastore.
struct TypedCodec<Input, Output> {
    manager: Arc<dyn ResourceManager<Input, Output>>,
}

impl<Input, Output> ResourceCodec for TypedCodec<Input, Output>
where
    Input: Serialize + DeserializeOwned + Clone + fmt::Debug + 'static,
    Output: Serialize + DeserializeOwned + Clone + fmt::Debug + 'static,
{
    fn encode(&self, item: &dyn ResourceItem) -> Result<Value, RegistryError> {
        let shared = item
            .as_any()
            .downcast_ref::<SharedResource<Input, Output>>()
            .ok_or_else(|| RegistryError::UnexpectedType(item.id()))?;
        let resource = shared
            .resource
            .lock()
            .map_err(|_| RegistryError::LockFail(item.id()))?;
        Ok(serde_json::to_value(&*resource)?)
    }

    fn decode(&self, value: Value) -> Result<Arc<dyn ResourceItem>, RegistryError> {
        let mut resource: Resource<Input, Output> = serde_json::from_value(value)?;
        resource.manager = Some(Arc::clone(&self.manager));
        Ok(Arc::new(SharedResource::new(resource)))
    }
}

/// Resource kinds known to this run, each with the manager that drives it.
#[derive(Default)]
pub struct Registry {
    codecs: HashMap<ResourceType, Box<dyn ResourceCodec>>,
}

impl Registry {
    pub fn register<Input, Output>(
        &mut self,
        resource_type: ResourceType,
        manager: Arc<dyn ResourceManager<Input, Output>>,
    ) -> Result<(), RegistryError>
    where
        Input: Serialize + DeserializeOwned + Clone + fmt::Debug + 'static,
        Output: Serialize + DeserializeOwned + Clone + fmt::Debug + 'static,
    {
        match self.codecs.entry(resource_type) {
            Entry::Occupied(entry) => {
                Err(RegistryError::AlreadyRegistered(entry.key().to_string()))
            }
            Entry::Vacant(entry) => {
                entry.insert(Box::new(TypedCodec { manager }));
                Ok(())
            }
        }
    }

    fn codec(&self, resource_type: &ResourceType) -> Result<&dyn ResourceCodec, RegistryError> {
        self.codecs
            .get(resource_type)
            .map(|codec| codec.as_ref())
            .ok_or_else(|| RegistryError::UnknownType(resource_type.to_string()))
    }

    pub fn encode(&self, item: &dyn ResourceItem) -> Result<Value, RegistryError> {
        self.codec(&item.resource_type())?.encode(item)
    }

    pub fn decode(
        &self,
        resource_type: &ResourceType,
        value: Value,
    ) -> Result<Arc<dyn ResourceItem>, RegistryError> {
        self.codec(resource_type)?.decode(value)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Resource type {0} is registered twice")]
    AlreadyRegistered(String),
    #[error("Unknown resource type {0}")]
    UnknownType(String),
    #[error("Resource {0} does not match its registered type")]
    UnexpectedType(String),
    #[error("Resource {0} lock is poisoned")]
    LockFail(String),
    #[error("Could not (de)serialize resource: {0}")]
    Serde(#[from] serde_json::Error),
}
