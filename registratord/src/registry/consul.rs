use std::collections::HashMap;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use url::Url;
use crate::error::RegistryError;

/// Check attached to a registration; exactly one of `http`, `script`, `ttl`
/// is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceCheck {
    #[serde(rename = "HTTP", skip_serializing_if = "String::is_empty", default)]
    pub http: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub script: String,
    #[serde(rename = "TTL", skip_serializing_if = "String::is_empty", default)]
    pub ttl: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub interval: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub timeout: String,
}

/// Body of `PUT /v1/agent/service/register`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub port: u16,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<AgentServiceCheck>,
}

/// Entry of `GET /v1/agent/services`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentService {
    #[serde(rename = "ID")]
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub address: String,
}

/// Agent-scoped registry operations
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Upsert a service registration
    async fn service_register(&self, registration: &AgentServiceRegistration) -> Result<(), RegistryError>;

    async fn service_deregister(&self, id: &str) -> Result<(), RegistryError>;

    /// Everything registered with the agent, keyed by service id
    async fn services(&self) -> Result<HashMap<String, AgentService>, RegistryError>;

    /// Address of the current raft leader
    async fn leader(&self) -> Result<String, RegistryError>;
}

/// Consul agent HTTP API client
pub struct ConsulClient {
    base: Url,
    client: Client,
}

impl ConsulClient {
    /// `address` is "host:port" or a full "http://host:port" URL
    pub fn new(address: &str, client: Client) -> Result<Self, url::ParseError> {
        let base = if address.contains("://") {
            Url::parse(address)?
        } else {
            Url::parse(&format!("http://{address}"))?
        };
        Ok(Self { base, client })
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.to_string()
    }

    async fn send(&self, req: RequestBuilder, url: &str) -> Result<Response, RegistryError> {
        let resp = req.send().await.map_err(|source| RegistryError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_else(|e| {
            tracing::debug!("consul: failed to read error body from {}: {}", url, e);
            String::new()
        });
        Err(RegistryError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RegistryBackend for ConsulClient {
    async fn service_register(&self, registration: &AgentServiceRegistration) -> Result<(), RegistryError> {
        let url = self.url(&["v1", "agent", "service", "register"]);
        self.send(self.client.put(&url).json(registration), &url).await?;
        Ok(())
    }

    async fn service_deregister(&self, id: &str) -> Result<(), RegistryError> {
        let url = self.url(&["v1", "agent", "service", "deregister", id]);
        self.send(self.client.put(&url), &url).await?;
        Ok(())
    }

    async fn services(&self) -> Result<HashMap<String, AgentService>, RegistryError> {
        let url = self.url(&["v1", "agent", "services"]);
        let resp = self.send(self.client.get(&url), &url).await?;
        resp.json()
            .await
            .map_err(|source| RegistryError::Decode { url, source })
    }

    async fn leader(&self) -> Result<String, RegistryError> {
        let url = self.url(&["v1", "status", "leader"]);
        let resp = self.send(self.client.get(&url), &url).await?;
        resp.json()
            .await
            .map_err(|source| RegistryError::Decode { url, source })
    }
}
