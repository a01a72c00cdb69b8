use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::{
    manager::{ManagerError, ResourceManager},
    plan::{item_as_resource, ResourceItem},
    registry::ResourceType,
};

#[derive(Debug, Clone)]
pub struct SharedResource<Input: Clone, Output: Clone> {
    pub resource: Arc<Mutex<Resource<Input, Output>>>,
}

impl<Input, Output> ResourceItem for SharedResource<Input, Output>
where
    Input: Clone + 'static + fmt::Debug,
    Output: Clone + 'static + fmt::Debug,
{
    fn id(&self) -> String {
        self.resource.lock().unwrap().id.clone()
    }
    fn name(&self) -> String {
        self.resource.lock().unwrap().name.clone()
    }
    fn resource_type(&self) -> ResourceType {
        self.resource.lock().unwrap().resource_type.clone()
    }
    fn state(&self) -> ResourceState {
        self.resource.lock().unwrap().state.clone()
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn validate(&self) -> Result<(), ResourceError> {
        self.lock()?.validate()
    }
    fn ensure_present(&self, latest: Option<Arc<dyn ResourceItem>>) -> Result<(), ResourceError> {
        self.lock()?.ensure_present(latest)
    }
    fn ensure_absent(&self) -> Result<bool, ResourceError> {
        self.lock()?.ensure_absent()
    }
    fn import(&self, external_id: &str) -> Result<(), ResourceError> {
        self.lock()?.import(external_id)
    }
}

impl<Input: Clone + 'static, Output: Clone + 'static> SharedResource<Input, Output> {
    pub fn new_resource(
        resource_type: ResourceType,
        manager: Arc<dyn ResourceManager<Input, Output>>,
        name: impl ToString,
        input: Input,
        state: ResourceState,
    ) -> Self {
        Self::new(Resource::new(resource_type, manager, name, input, state))
    }
    pub fn new(resource: Resource<Input, Output>) -> Self {
        Self {
            resource: Arc::new(Mutex::new(resource)),
        }
    }
    fn lock(&self) -> Result<MutexGuard<Resource<Input, Output>>, ResourceError> {
        self.resource
            .lock()
            .map_err(|err| ResourceError::LockFail(err.to_string()))
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Resource<Input, Output> {
    pub resource_type: ResourceType, //Info that helps deserialize and serialize this resource
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub input: Input,
    pub output: Option<Output>,
    pub state: ResourceState,
    #[serde(skip, default = "default_manager")]
    pub manager: Option<Arc<dyn ResourceManager<Input, Output>>>,
}

impl<Input: fmt::Debug, Output: fmt::Debug> fmt::Debug for Resource<Input, Output> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("resource_type", &self.resource_type)
            .field("id", &self.id)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("state", &self.state)
            .finish()
    }
}

impl<Input: Clone + 'static, Output: Clone + 'static> Resource<Input, Output> {
    pub fn new(
        resource_type: ResourceType,
        manager: Arc<dyn ResourceManager<Input, Output>>,
        name: impl ToString,
        input: Input,
        state: ResourceState,
    ) -> Self {
        let name = name.to_string();
        let id = resource_type.address(&name);
        debug!("New Resource[{}]", id);
        Self {
            id,
            name,
            resource_type,
            input,
            output: Default::default(),
            state,
            manager: Some(manager),
        }
    }
    fn manager(&self) -> Result<&Arc<dyn ResourceManager<Input, Output>>, ResourceError> {
        self.manager.as_ref().ok_or(ResourceError::ManagerNotSet)
    }
    fn validate(&self) -> Result<(), ResourceError> {
        Ok(self.manager()?.validate(&self.input)?)
    }
    fn ensure_present(
        &mut self,
        latest: Option<Arc<dyn ResourceItem>>,
    ) -> Result<(), ResourceError> {
        let latest_output = match latest {
            Some(latest) => item_as_resource::<Input, Output>(latest.as_ref())?.output,
            None => None,
        };
        info!("Ensuring Resource[{}] is present", self.id);
        let output = self
            .manager()?
            .ensure_present(latest_output.as_ref(), &self.input)?;
        info!("Resource[{}] is present", self.id);
        self.output = Some(output);
        Ok(())
    }

    fn ensure_absent(&mut self) -> Result<bool, ResourceError> {
        let output = match self.output.as_ref() {
            Some(output) => output,
            None => return Ok(false),
        };
        info!("Ensuring Resource[{}] is absent", self.id);
        let deleted = self.manager()?.ensure_absent(output)?;
        info!("Resource[{}] is absent", self.id);
        Ok(deleted)
    }

    fn import(&mut self, external_id: &str) -> Result<(), ResourceError> {
        info!("Importing {:?} into Resource[{}]", external_id, self.id);
        let output = self.manager()?.import(external_id)?;
        self.output = Some(output);
        Ok(())
    }
}

pub fn default_manager<Input, Output>() -> Option<Arc<dyn ResourceManager<Input, Output>>> {
    None
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum ResourceState {
    Absent,
    #[default]
    Present,
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("LockFail: {0}")]
    LockFail(String),
    #[error("DowncastFail: {0} is not of the expected resource type")]
    DowncastFail(String),
    #[error("ManagerNotSet")]
    ManagerNotSet,
    #[error(transparent)]
    ManagerError(#[from] ManagerError),
}
