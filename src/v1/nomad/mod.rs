pub mod acl_policy;
pub mod client;
pub mod config;

use std::{fmt, marker::PhantomData, sync::Arc};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString};
use tokio::runtime::Handle;

use self::{
    acl_policy::AclPolicyResource,
    client::{AclPolicyApi, ClientError, NomadClient},
    config::NomadConfig,
};
use super::{
    manager::ResourceManager,
    plan::{PlanError, SharedPlan},
    registry::{Registry, RegistryError, ResourceType},
    resource::{ResourceState, SharedResource},
};

pub const PROVIDER_NAME: &str = "nomad";

#[derive(Serialize, Deserialize, Debug, Clone, EnumString, EnumIter, strum_macros::Display)]
pub enum NomadType {
    #[strum(ascii_case_insensitive)]
    AclPolicy,
}

/// API handles shared by every Nomad resource manager.
#[derive(Clone)]
pub struct NomadApis {
    acl_policies: Arc<dyn AclPolicyApi>,
}

impl NomadApis {
    pub fn new(acl_policies: Arc<dyn AclPolicyApi>) -> Self {
        Self { acl_policies }
    }
    pub fn from_config(config: &NomadConfig) -> Result<Self, ClientError> {
        let client = Arc::new(NomadClient::new(config)?);
        Ok(Self::new(client))
    }
    pub fn acl_policies(&self) -> Arc<dyn AclPolicyApi> {
        Arc::clone(&self.acl_policies)
    }
}

pub struct NomadProvider {
    plan: SharedPlan,
    handle: Handle,
    apis: NomadApis,
}

pub struct NomadManager<Input, Output, Client> {
    pub(crate) client: Client,
    pub(crate) handle: Handle,
    _phantom: PhantomData<fn() -> (Input, Output)>,
}

impl<Input, Output, Client> NomadManager<Input, Output, Client> {
    pub fn new(handle: &Handle, client: Client) -> Self {
        Self {
            client,
            handle: handle.clone(),
            _phantom: PhantomData,
        }
    }
    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

pub trait NomadResourceCreator {
    type Input: Clone + fmt::Debug + 'static;
    type Output: Clone + fmt::Debug + 'static;
    fn r#type() -> NomadType;
    fn manager(
        handle: &Handle,
        apis: &NomadApis,
    ) -> Arc<dyn ResourceManager<Self::Input, Self::Output>>;
    fn resource_type() -> ResourceType {
        ResourceType::new(PROVIDER_NAME, Self::r#type().to_string())
    }
    fn create(
        plan: &SharedPlan,
        handle: &Handle,
        apis: &NomadApis,
        name: &str,
        state: ResourceState,
        input: Self::Input,
    ) -> Result<SharedResource<Self::Input, Self::Output>, PlanError> {
        plan.resource(
            Self::resource_type(),
            Self::manager(handle, apis),
            name,
            state,
            input,
        )
    }
}

impl NomadProvider {
    pub fn new(handle: &Handle, plan: SharedPlan, apis: NomadApis) -> Self {
        Self {
            plan,
            handle: handle.clone(),
            apis,
        }
    }

    /// Makes every Nomad resource type decodable from the datastore.
    pub fn register_types(&self, registry: &mut Registry) -> Result<(), RegistryError> {
        NomadType::iter().try_for_each(|kind| match kind {
            NomadType::AclPolicy => registry.register(
                AclPolicyResource::resource_type(),
                AclPolicyResource::manager(&self.handle, &self.apis),
            ),
        })
    }

    pub fn resource<N: NomadResourceCreator>(
        &self,
        name: &str,
        state: ResourceState,
        input: N::Input,
    ) -> Result<SharedResource<N::Input, N::Output>, PlanError> {
        N::create(&self.plan, &self.handle, &self.apis, name, state, input)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::v1::nomad::client::MockAclPolicyApi;

    #[test]
    fn type_names_are_stable() {
        assert_eq!(NomadType::AclPolicy.to_string(), "AclPolicy");
        assert!(matches!(NomadType::from_str("aclpolicy"), Ok(NomadType::AclPolicy)));
        assert_eq!(
            AclPolicyResource::resource_type().address("readonly"),
            "nomad/AclPolicy/readonly"
        );
    }

    #[test]
    fn every_type_is_registered_once() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let apis = NomadApis::new(Arc::new(MockAclPolicyApi::new()));
        let provider = NomadProvider::new(rt.handle(), SharedPlan::default(), apis);
        let mut registry = Registry::default();
        provider.register_types(&mut registry).unwrap();
        assert!(matches!(
            provider.register_types(&mut registry),
            Err(RegistryError::AlreadyRegistered(_))
        ));
    }
}
