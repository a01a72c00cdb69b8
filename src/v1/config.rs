use std::{collections::BTreeMap, fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;

use super::{
    nomad::{
        acl_policy::{AclPolicyConfig, AclPolicyResource},
        config::NomadConfig,
        NomadProvider,
    },
    plan::PlanError,
    resource::ResourceState,
};

/// Declarative document: one optional `provider` block and `acl_policy`
/// blocks keyed by their local name.
///
/// ```json
/// {
///   "provider": { "address": "http://127.0.0.1:4646" },
///   "acl_policy": {
///     "readonly": { "name": "readonly", "rules_hcl": "namespace \"default\" {}" }
///   }
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default)]
    pub provider: NomadConfig,
    #[serde(default)]
    pub acl_policy: BTreeMap<String, AclPolicyConfig>,
}

impl Configuration {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Adds every block of the document to the provider's plan.
    pub fn declare(&self, nomad: &NomadProvider) -> Result<(), PlanError> {
        for (local_name, policy) in &self.acl_policy {
            nomad.resource::<AclPolicyResource>(local_name, ResourceState::Present, policy.clone())?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read configuration: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}
