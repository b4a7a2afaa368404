use axum::http::StatusCode;
use serde_json::Value;
use sleuth_operator::{
    builtin::BuiltinSource,
    config::Config,
    mcp::McpProbe,
    metrics,
    server::Server,
    toolset::{Tool, Toolset, ToolsetKind, ToolsetManager},
    transform::TransformerRegistry,
};
use std::sync::Arc;
use tokio::sync::RwLock;

struct StaticSource(Vec<Toolset>);

impl BuiltinSource for StaticSource {
    fn discover(&self) -> Vec<Toolset> {
        self.0.clone()
    }
}

struct HealthyProbe;

#[async_trait::async_trait]
impl McpProbe for HealthyProbe {
    async fn check_health(&self, _url: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

async fn test_server() -> axum_test::TestServer {
    let source = StaticSource(vec![Toolset::new(
        "kubernetes",
        "Inspect Kubernetes resources",
        ToolsetKind::Builtin,
    )
    .with_tools(vec![
        Tool::new("kubectl_get", "List resources"),
        Tool::new("kubectl_logs", "Fetch logs"),
    ])]);

    let mut manager = ToolsetManager::new(
        Arc::new(source),
        Arc::new(HealthyProbe),
        Arc::new(TransformerRegistry::new()),
    );
    manager.resolve(false).await.expect("Failed to resolve toolsets");

    let config = Config::default();
    let server = Server::new(&config, Arc::new(RwLock::new(manager)));
    axum_test::TestServer::new(server.build_router()).unwrap()
}

#[tokio::test]
async fn test_server_endpoints() {
    let client = test_server().await;

    // Test health endpoint
    let response = client.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");

    // Test toolset listing
    let response = client.get("/toolsets").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let toolsets = body["toolsets"].as_array().unwrap();
    assert_eq!(toolsets.len(), 1);
    assert_eq!(toolsets[0]["name"], "kubernetes");
    assert_eq!(toolsets[0]["status"], "enabled");
    assert_eq!(toolsets[0]["tool_count"], 2);

    // Test toolset detail
    let response = client.get("/toolsets/kubernetes").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["summary"]["kind"], "builtin");
    let tools = body["tools"].as_array().unwrap();
    assert!(tools.iter().any(|t| t == "kubectl_get"));

    // Test unknown toolset
    let response = client.get("/toolsets/no-such-toolset").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "Toolset not found");
}

#[tokio::test]
async fn test_refresh_endpoint() {
    let client = test_server().await;

    let response = client.post("/refresh").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "refreshed");
    assert_eq!(body["toolsets"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    metrics::register_metrics();
    let client = test_server().await;

    let response = client.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("sleuth_toolsets_enabled"));
}
