use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::debug;

use super::{
    client::{AclPolicy, AclPolicyApi, JobAcl},
    NomadApis, NomadManager, NomadResourceCreator, NomadType,
};
use crate::v1::manager::{ManagerError, ResourceManager};

pub const DEFAULT_NAMESPACE: &str = "default";

pub type AclPolicyInput = AclPolicyConfig;
pub type AclPolicyOutput = AclPolicyState;
pub type AclPolicyManager = NomadManager<AclPolicyInput, AclPolicyOutput, Arc<dyn AclPolicyApi>>;

/// Declares `acl_policy` resources through [`NomadProvider::resource`].
///
/// [`NomadProvider::resource`]: super::NomadProvider::resource
pub struct AclPolicyResource;

impl NomadResourceCreator for AclPolicyResource {
    type Input = AclPolicyInput;
    type Output = AclPolicyOutput;
    fn r#type() -> NomadType {
        NomadType::AclPolicy
    }
    fn manager(
        handle: &Handle,
        apis: &NomadApis,
    ) -> Arc<dyn ResourceManager<Self::Input, Self::Output>> {
        AclPolicyManager::new(handle, apis.acl_policies()).arc()
    }
}

/// Declarative `acl_policy` block.
#[derive(Default, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AclPolicyConfig {
    /// Unique policy name, also the remote identifier. Changing it replaces
    /// the policy.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// HCL or JSON rules, passed through untouched.
    pub rules_hcl: String,
    /// At most one block.
    #[serde(default)]
    pub job_acl: Vec<JobAclConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JobAclConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub task: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for JobAclConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            job_id: Default::default(),
            group: Default::default(),
            task: Default::default(),
        }
    }
}

impl From<JobAcl> for JobAclConfig {
    fn from(value: JobAcl) -> Self {
        Self {
            namespace: value.namespace,
            job_id: value.job_id,
            group: value.group,
            task: value.task,
        }
    }
}

/// What the cluster reports for a policy.
#[derive(Default, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AclPolicyState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rules_hcl: String,
    pub job_acl: Vec<JobAclConfig>,
    pub create_index: u64,
    pub modify_index: u64,
}

impl AclPolicyState {
    fn from_policy(id: &str, policy: AclPolicy) -> Self {
        Self {
            id: id.to_string(),
            name: policy.name,
            description: policy.description,
            rules_hcl: policy.rules,
            job_acl: policy.job_acl.map(JobAclConfig::from).into_iter().collect(),
            create_index: policy.create_index,
            modify_index: policy.modify_index,
        }
    }
}

/// Validates the `job_acl` blocks and turns them into the API scope.
///
/// Empty strings count as unset. The namespace falls back to `default`.
pub fn parse_job_acl(blocks: &[JobAclConfig]) -> Result<Option<JobAcl>, ManagerError> {
    let block = match blocks {
        [] => return Ok(None),
        [block] => block,
        _ => {
            return Err(ManagerError::Validation(
                "only one job_acl block is allowed".to_string(),
            ))
        }
    };
    let namespace = match block.namespace.as_str() {
        "" => DEFAULT_NAMESPACE,
        namespace => namespace,
    };
    if !block.job_id.is_empty() && namespace.is_empty() {
        return Err(ManagerError::Validation(
            "namespace must be set to set job ID".to_string(),
        ));
    }
    if !block.group.is_empty() && block.job_id.is_empty() {
        return Err(ManagerError::Validation(
            "job ID must be set to set group".to_string(),
        ));
    }
    if !block.task.is_empty() && block.group.is_empty() {
        return Err(ManagerError::Validation(
            "group must be set to set task".to_string(),
        ));
    }
    Ok(Some(JobAcl {
        namespace: namespace.to_string(),
        job_id: block.job_id.clone(),
        group: block.group.clone(),
        task: block.task.clone(),
    }))
}

impl AclPolicyConfig {
    pub fn to_api_policy(&self) -> Result<AclPolicy, ManagerError> {
        Ok(AclPolicy {
            name: self.name.clone(),
            description: self.description.clone(),
            rules: self.rules_hcl.clone(),
            job_acl: parse_job_acl(&self.job_acl)?,
            ..Default::default()
        })
    }
}

impl AclPolicyManager {
    fn upsert(&self, policy: &AclPolicy) -> Result<(), String> {
        self.handle
            .block_on(self.client.upsert(policy))
            .map_err(|e| e.to_string())
    }
}

impl ResourceManager<AclPolicyInput, AclPolicyOutput> for AclPolicyManager {
    fn create(&self, input: &AclPolicyInput) -> Result<AclPolicyOutput, ManagerError> {
        let policy = input.to_api_policy()?;
        debug!("Creating ACL policy {:?}", policy.name);
        self.upsert(&policy).map_err(|e| {
            ManagerError::CreateFail(format!("error inserting ACLPolicy {:?}: {}", policy.name, e))
        })?;
        debug!("Created ACL policy {:?}", policy.name);
        self.read(&policy.name)
    }

    fn read(&self, id: &str) -> Result<AclPolicyOutput, ManagerError> {
        debug!("Reading ACL policy {:?}", id);
        // Exists runs first, so a 404 here is a plain failure.
        let policy = self
            .handle
            .block_on(self.client.info(id))
            .map_err(|e| ManagerError::LookupFail(format!("error reading ACLPolicy {:?}: {}", id, e)))?;
        debug!("Read ACL policy {:?}", id);
        Ok(AclPolicyState::from_policy(id, policy))
    }

    fn update(&self, id: &str, input: &AclPolicyInput) -> Result<AclPolicyOutput, ManagerError> {
        let policy = input.to_api_policy()?;
        debug!("Updating ACL policy {:?}", policy.name);
        self.upsert(&policy).map_err(|e| {
            ManagerError::UpdateFail(format!("error updating ACLPolicy {:?}: {}", policy.name, e))
        })?;
        debug!("Updated ACL policy {:?}", policy.name);
        self.read(id)
    }

    fn delete(&self, id: &str) -> Result<(), ManagerError> {
        debug!("Deleting ACL policy {:?}", id);
        self.handle
            .block_on(self.client.delete(id))
            .map_err(|e| ManagerError::DeleteFail(format!("error deleting ACLPolicy {:?}: {}", id, e)))?;
        debug!("Deleted ACL policy {:?}", id);
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool, ManagerError> {
        debug!("Checking if ACL policy {:?} exists", id);
        match self.handle.block_on(self.client.info(id)) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(ManagerError::ExistsCheckFail(format!(
                "error checking for ACL policy {:?}: {}",
                id, e
            ))),
        }
    }

    fn validate(&self, input: &AclPolicyInput) -> Result<(), ManagerError> {
        input.to_api_policy().map(|_| ())
    }

    fn state_id(&self, output: &AclPolicyOutput) -> String {
        output.id.clone()
    }

    fn requires_replace(&self, latest: &AclPolicyOutput, input: &AclPolicyInput) -> bool {
        latest.id != input.name
    }

    fn is_in_sync(&self, output: &AclPolicyOutput, input: &AclPolicyInput) -> bool {
        let desired_scope = match parse_job_acl(&input.job_acl) {
            Ok(scope) => scope.map(JobAclConfig::from),
            // Let update surface the validation error.
            Err(_) => return false,
        };
        output.name == input.name
            && output.description == input.description
            && output.rules_hcl == input.rules_hcl
            && output.job_acl.first() == desired_scope.as_ref()
    }
}
