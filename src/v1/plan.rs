use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;
use tracing::info;

use super::{
    datastore::{Datastore, DatastoreError},
    manager::ResourceManager,
    registry::{Registry, ResourceType},
    resource::{Resource, ResourceError, ResourceState, SharedResource},
};

#[derive(Clone, Default)]
pub struct SharedPlan {
    inner: Arc<Mutex<Plan>>,
}

impl SharedPlan {
    fn lock(&self) -> Result<MutexGuard<Plan>, PlanError> {
        self.inner.lock().map_err(|_| PlanError::LockFail)
    }
    pub fn resource<Input: Clone + 'static + fmt::Debug, Output: Clone + 'static + fmt::Debug>(
        &self,
        rtype: ResourceType,
        mngr: Arc<dyn ResourceManager<Input, Output>>,
        name: &str,
        state: ResourceState,
        input: Input,
    ) -> Result<SharedResource<Input, Output>, PlanError> {
        self.lock()?.add_resource(rtype, mngr, name, state, input)
    }
    pub fn apply(
        &self,
        datastore: &mut Datastore,
        registry: &Registry,
    ) -> Result<(), PlanError> {
        self.lock()?.apply(datastore, registry)
    }
    pub fn destroy(
        &self,
        datastore: &mut Datastore,
        registry: &Registry,
    ) -> Result<(), PlanError> {
        self.lock()?.destroy(datastore, registry)
    }
    pub fn import(
        &self,
        name: &str,
        external_id: &str,
        datastore: &mut Datastore,
        registry: &Registry,
    ) -> Result<(), PlanError> {
        self.lock()?.import(name, external_id, datastore, registry)
    }
}

/// Declared resources keyed by datastore address, iterated in address order.
#[derive(Default)]
pub struct Plan {
    resources: BTreeMap<String, Arc<dyn ResourceItem>>,
}

impl Plan {
    pub fn add_resource<
        Input: Clone + 'static + fmt::Debug,
        Output: Clone + 'static + fmt::Debug,
    >(
        &mut self,
        resource_type: ResourceType,
        manager: Arc<dyn ResourceManager<Input, Output>>,
        name: &str,
        state: ResourceState,
        input: Input,
    ) -> Result<SharedResource<Input, Output>, PlanError> {
        let id = resource_type.address(name);
        if self.resources.contains_key(&id) {
            return Err(PlanError::ResourceAlreadyExists(id));
        }
        let resource = SharedResource::new_resource(resource_type, manager, name, input, state);
        self.resources
            .insert(id, Arc::new(resource.clone()) as Arc<dyn ResourceItem>);
        Ok(resource)
    }

    pub fn apply(
        &self,
        datastore: &mut Datastore,
        registry: &Registry,
    ) -> Result<(), PlanError> {
        info!("--- Applying plan ---");
        self.validate()?;
        self.apply_absent(datastore, registry)?;
        self.apply_present(datastore, registry)
    }

    /// Rejects the run before anything is deleted if a present resource
    /// could not be created.
    fn validate(&self) -> Result<(), PlanError> {
        self.resources
            .values()
            .filter(|resource| resource.state() == ResourceState::Present)
            .try_for_each(|resource| resource.validate())
            .map_err(PlanError::from)
    }

    fn apply_present(
        &self,
        datastore: &mut Datastore,
        registry: &Registry,
    ) -> Result<(), PlanError> {
        info!("--- Ensuring resources are present ---");
        for resource in self.resources.values() {
            if resource.state() != ResourceState::Present {
                continue;
            }
            let id = resource.id();
            //Retrieve the latest resource version from datastore
            let latest = datastore.lookup(registry, &id)?;
            resource.ensure_present(latest)?;
            datastore.record(registry, resource.as_ref())?;
        }
        Ok(())
    }

    fn apply_absent(
        &self,
        datastore: &mut Datastore,
        registry: &Registry,
    ) -> Result<(), PlanError> {
        info!("--- Ensuring planned resources are absent ---");
        let mut to_be_kept = vec![];
        for resource in self.resources.values().rev() {
            let id = resource.id();
            match resource.state() {
                ResourceState::Absent => {
                    if let Some(latest) = datastore.lookup(registry, &id)? {
                        latest.ensure_absent()?;
                    }
                    datastore.forget(&id);
                }
                ResourceState::Present => to_be_kept.push(id),
            }
        }
        info!("--- Ensuring missing resources are absent ---");
        let orphans = datastore
            .addresses()
            .into_iter()
            .filter(|key| !to_be_kept.contains(key))
            .collect();
        self.delete_ids(orphans, datastore, registry)
    }

    fn delete_ids(
        &self,
        ids: Vec<String>,
        datastore: &mut Datastore,
        registry: &Registry,
    ) -> Result<(), PlanError> {
        ids.into_iter().rev().try_for_each(|key| -> Result<(), PlanError> {
            if let Some(resource) = datastore.lookup(registry, &key)? {
                resource.ensure_absent()?;
            }
            datastore.forget(&key);
            Ok(())
        })
    }

    pub fn destroy(
        &self,
        datastore: &mut Datastore,
        registry: &Registry,
    ) -> Result<(), PlanError> {
        info!("--- Destroying every managed resource ---");
        self.delete_ids(datastore.addresses(), datastore, registry)
    }

    /// Adopts an existing remote object into the state of the resource
    /// declared under `name`.
    pub fn import(
        &self,
        name: &str,
        external_id: &str,
        datastore: &mut Datastore,
        registry: &Registry,
    ) -> Result<(), PlanError> {
        let resource = self
            .resources
            .values()
            .find(|resource| resource.name() == name)
            .ok_or_else(|| PlanError::ResourceNotDeclared(name.to_string()))?;
        let id = resource.id();
        if datastore.contains(&id) {
            return Err(PlanError::ResourceAlreadyManaged(id));
        }
        resource.import(external_id)?;
        datastore.record(registry, resource.as_ref())?;
        Ok(())
    }
}

pub trait ResourceItem: fmt::Debug {
    fn as_any(&self) -> &dyn std::any::Any;
    fn resource_type(&self) -> ResourceType;
    fn id(&self) -> String;
    fn name(&self) -> String;
    fn state(&self) -> ResourceState;
    fn validate(&self) -> Result<(), ResourceError>;
    fn ensure_present(&self, latest: Option<Arc<dyn ResourceItem>>) -> Result<(), ResourceError>;
    fn ensure_absent(&self) -> Result<bool, ResourceError>;
    fn import(&self, external_id: &str) -> Result<(), ResourceError>;
}

pub fn item_as_resource<Input: Clone + 'static, Output: Clone + 'static>(
    item: &dyn ResourceItem,
) -> Result<Resource<Input, Output>, ResourceError> {
    let shared = item
        .as_any()
        .downcast_ref::<SharedResource<Input, Output>>()
        .ok_or_else(|| ResourceError::DowncastFail(item.id()))?;
    let resource = shared
        .resource
        .lock()
        .map_err(|err| ResourceError::LockFail(err.to_string()))?;
    Ok(resource.clone())
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Resource {0} already exists")]
    ResourceAlreadyExists(String),
    #[error("Resource {0} is not declared in the plan")]
    ResourceNotDeclared(String),
    #[error("Resource {0} is already managed, remove it from the state before importing")]
    ResourceAlreadyManaged(String),
    #[error("Plan lock is poisoned")]
    LockFail,
    #[error("Resource error: {0}")]
    ResourceError(#[from] ResourceError),
    #[error("Datastore error: {0}")]
    DatastoreError(#[from] DatastoreError),
}
