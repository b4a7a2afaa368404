//! MCP Server Probe
//!
//! Health contract for externally hosted tool providers. The core only
//! needs to know whether a server answers at its configured URL; tool
//! listing and invocation go through the MCP client collaborator.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait McpProbe: Send + Sync {
    async fn check_health(&self, url: &str) -> anyhow::Result<()>;
}

pub struct HttpMcpProbe {
    client: reqwest::Client,
}

impl HttpMcpProbe {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpMcpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl McpProbe for HttpMcpProbe {
    async fn check_health(&self, url: &str) -> anyhow::Result<()> {
        let parsed = Url::parse(url)?;
        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        // MCP endpoints typically only speak POST; a 405 still proves the
        // server is there.
        if status.is_success() || status == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            Ok(())
        } else {
            anyhow::bail!("MCP server at {} answered with {}", url, status)
        }
    }
}
