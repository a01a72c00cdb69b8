use std::env;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:4646";
pub const DEFAULT_REGION: &str = "global";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings of the Nomad provider.
///
/// Every field is optional so that a `provider` block in the configuration
/// file can override only part of what the environment supplies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NomadConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// ACL token sent as `X-Nomad-Token`.
    #[serde(default)]
    pub secret_id: Option<String>,
    /// `user[:password]` for HTTP basic auth.
    #[serde(default)]
    pub http_auth: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl NomadConfig {
    /// Reads `NOMAD_ADDR`, `NOMAD_REGION`, `NOMAD_TOKEN`, `NOMAD_HTTP_AUTH`
    /// and `NOMAD_TIMEOUT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            address: get("NOMAD_ADDR"),
            region: get("NOMAD_REGION"),
            secret_id: get("NOMAD_TOKEN"),
            http_auth: get("NOMAD_HTTP_AUTH"),
            timeout_secs: get("NOMAD_TIMEOUT").and_then(|value| value.parse().ok()),
        }
    }

    /// Fields set on `self` win, the rest come from `fallback`.
    pub fn or(self, fallback: NomadConfig) -> Self {
        Self {
            address: self.address.or(fallback.address),
            region: self.region.or(fallback.region),
            secret_id: self.secret_id.or(fallback.secret_id),
            http_auth: self.http_auth.or(fallback.http_auth),
            timeout_secs: self.timeout_secs.or(fallback.timeout_secs),
        }
    }

    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(DEFAULT_ADDRESS)
    }
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
    pub fn basic_auth(&self) -> Option<(String, Option<String>)> {
        self.http_auth.as_ref().map(|auth| match auth.split_once(':') {
            Some((user, password)) => (user.to_string(), Some(password.to_string())),
            None => (auth.clone(), None),
        })
    }
}
