//! Thin client for the Consul HTTP API.
//!
//! Only the catalog-read and agent-register/deregister endpoints the
//! services sync needs. Errors reuse the API error taxonomy so the caller
//! classifies Consul failures (timeouts, 5xx) the same way as API ones.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use storm_client::{ApiError, Result};

pub const CONSUL_HTTP_PORT: u16 = 8500;

/// Tag marking services owned by Perfect Storm; anything else is ignored
pub const MANAGED_TAG: &str = "ps-consul";

/// One entry of `GET /v1/catalog/service/<name>`
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "ServiceName")]
    pub name: String,

    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "ServicePort")]
    pub port: u16,

    #[serde(rename = "ServiceTags", default)]
    pub tags: Vec<String>,
}

impl CatalogEntry {
    pub fn is_managed(&self) -> bool {
        self.tags.iter().any(|t| t == MANAGED_TAG)
    }
}

#[derive(Debug, Clone)]
pub struct ConsulCatalog {
    http: reqwest::Client,
    port: u16,
}

impl ConsulCatalog {
    pub fn new() -> Result<Self> {
        Self::with_port(CONSUL_HTTP_PORT)
    }

    /// Talk to agents on a non-standard HTTP port
    pub fn with_port(port: u16) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, port })
    }

    fn url(&self, agent_addr: &str, path: &str) -> String {
        format!("http://{}:{}/v1/{}", agent_addr, self.port, path)
    }

    /// Service names known to the catalog, with their tags
    pub async fn services(&self, server_addr: &str) -> Result<HashMap<String, Vec<String>>> {
        let response = self
            .http
            .get(self.url(server_addr, "catalog/services"))
            .send()
            .await?;
        Self::read(response).await
    }

    /// Catalog entries for one service
    pub async fn service(&self, server_addr: &str, name: &str) -> Result<Vec<CatalogEntry>> {
        let response = self
            .http
            .get(self.url(server_addr, &format!("catalog/service/{}", name)))
            .send()
            .await?;
        Self::read(response).await
    }

    /// Register a managed service against the agent at `agent_addr`
    pub async fn register(&self, agent_addr: &str, name: &str, port: u16) -> Result<()> {
        let body = serde_json::json!({
            "Name": name,
            "Port": port,
            "Tags": [MANAGED_TAG],
        });
        let response = self
            .http
            .put(self.url(agent_addr, "agent/service/register"))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await
    }

    /// Deregister a managed service from the agent at `agent_addr`
    pub async fn deregister(&self, agent_addr: &str, name: &str) -> Result<()> {
        let response = self
            .http
            .put(self.url(
                agent_addr,
                &format!("agent/service/deregister/{}", name),
            ))
            .send()
            .await?;
        Self::check(response).await
    }

    async fn read<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn check(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}
