use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use super::config::NomadConfig;

/// ACL policy as exchanged with `/v1/acl/policy/:name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AclPolicy {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: String,
    #[serde(rename = "JobACL", default, skip_serializing_if = "Option::is_none")]
    pub job_acl: Option<JobAcl>,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default)]
    pub modify_index: u64,
}

/// Workload identity scope of a policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobAcl {
    #[serde(default)]
    pub namespace: String,
    #[serde(rename = "JobID", default)]
    pub job_id: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub task: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AclPolicyApi: Send + Sync {
    /// Create-or-replace keyed by `policy.name`.
    async fn upsert(&self, policy: &AclPolicy) -> Result<(), ClientError>;
    async fn delete(&self, name: &str) -> Result<(), ClientError>;
    async fn info(&self, name: &str) -> Result<AclPolicy, ClientError>;
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Unexpected response code: {status} ({body})")]
    UnexpectedStatus { status: u16, body: String },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ClientError::UnexpectedStatus { status, .. } if *status == StatusCode::NOT_FOUND.as_u16()
        )
    }
}

/// HTTP client for the Nomad API.
#[derive(Debug, Clone)]
pub struct NomadClient {
    http: reqwest::Client,
    base: Url,
    region: Option<String>,
    secret_id: Option<String>,
    basic_auth: Option<(String, Option<String>)>,
}

impl NomadClient {
    pub fn new(config: &NomadConfig) -> Result<Self, ClientError> {
        let base = Url::parse(config.address()).map_err(|e| {
            ClientError::InvalidConfig(format!("address {:?}: {}", config.address(), e))
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidConfig(format!(
                "address {:?} cannot be used as a base url",
                config.address()
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs()))
            .build()?;
        Ok(Self {
            http,
            base,
            region: config.region.clone(),
            secret_id: config.secret_id.clone(),
            basic_auth: config.basic_auth(),
        })
    }

    pub fn policy_url(&self, name: &str) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidConfig(format!("invalid base url {}", self.base)))?
            .pop_if_empty()
            .extend(&["v1", "acl", "policy", name]);
        if let Some(region) = self.region.as_ref() {
            url.query_pairs_mut().append_pair("region", region);
        }
        Ok(url)
    }

    fn request(&self, method: Method, name: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.policy_url(name)?;
        debug!("{} {}", method, url);
        let mut builder = self.http.request(method, url);
        if let Some(token) = self.secret_id.as_ref() {
            builder = builder.header("X-Nomad-Token", token);
        }
        if let Some((user, password)) = self.basic_auth.as_ref() {
            builder = builder.basic_auth(user, password.as_ref());
        }
        Ok(builder)
    }

    async fn send(builder: RequestBuilder) -> Result<String, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body: body.trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl AclPolicyApi for NomadClient {
    async fn upsert(&self, policy: &AclPolicy) -> Result<(), ClientError> {
        let builder = self
            .request(Method::PUT, &policy.name)?
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(policy)?);
        Self::send(builder).await.map(|_| ())
    }

    async fn delete(&self, name: &str) -> Result<(), ClientError> {
        Self::send(self.request(Method::DELETE, name)?)
            .await
            .map(|_| ())
    }

    async fn info(&self, name: &str) -> Result<AclPolicy, ClientError> {
        let body = Self::send(self.request(Method::GET, name)?).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
