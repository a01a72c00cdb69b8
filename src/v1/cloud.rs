use thiserror::Error;
use tokio::runtime::Handle;

use super::{
    datastore::{Datastore, DatastoreError},
    nomad::{NomadApis, NomadProvider},
    plan::{PlanError, SharedPlan},
    registry::{Registry, RegistryError},
};

/// Entry point of a run: the declared plan, the persisted state and the
/// registry able to rebuild typed resources from that state.
#[derive(Default)]
pub struct Cloud {
    plan: SharedPlan,
    datastore: Datastore,
    registry: Registry,
}

impl Cloud {
    pub fn new(datastore: Datastore) -> Self {
        Self {
            datastore,
            ..Default::default()
        }
    }

    /// Creates the provider resources are declared through, and registers
    /// its resource types so recorded state can be decoded.
    pub fn nomad_provider(
        &mut self,
        handle: &Handle,
        apis: NomadApis,
    ) -> Result<NomadProvider, CloudError> {
        let provider = NomadProvider::new(handle, self.plan.clone(), apis);
        provider.register_types(&mut self.registry)?;
        Ok(provider)
    }

    /// Runs `op` against freshly loaded state and saves the state afterwards,
    /// also when `op` failed halfway.
    fn with_state(
        &mut self,
        op: impl FnOnce(&SharedPlan, &mut Datastore, &Registry) -> Result<(), PlanError>,
    ) -> Result<(), CloudError> {
        self.datastore.reload()?;
        let result = op(&self.plan, &mut self.datastore, &self.registry).map_err(CloudError::PlanError);
        self.datastore.save()?;
        result
    }

    pub fn apply(&mut self) -> Result<(), CloudError> {
        self.with_state(|plan, datastore, registry| plan.apply(datastore, registry))
    }

    pub fn destroy(&mut self) -> Result<(), CloudError> {
        self.with_state(|plan, datastore, registry| plan.destroy(datastore, registry))
    }

    pub fn import(&mut self, name: &str, external_id: &str) -> Result<(), CloudError> {
        self.with_state(|plan, datastore, registry| {
            plan.import(name, external_id, datastore, registry)
        })
    }
}

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("DatastoreError: {0}")]
    DatastoreError(#[from] DatastoreError),
    #[error("PlanError: {0}")]
    PlanError(PlanError),
    #[error("RegistryError: {0}")]
    RegistryError(#[from] RegistryError),
}
