//! Builtin Toolset Catalog
//!
//! Bundled, declarative toolset definitions the manager discovers at
//! startup. Each definition carries its default config, prerequisites,
//! tool schemas and default transformers; the API wrappers that actually
//! execute the tools are external collaborators.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::toolset::{Prerequisite, Tool, Toolset, ToolsetKind, ToolsetTag, TransformerSpec};
use crate::transform::LLM_SUMMARIZE;

/// Discovery collaborator: returns a complete, valid entity per bundled
/// definition.
#[cfg_attr(test, mockall::automock)]
pub trait BuiltinSource: Send + Sync {
    fn discover(&self) -> Vec<Toolset>;
}

/// The definitions shipped with the operator.
pub struct BundledToolsets;

impl BuiltinSource for BundledToolsets {
    fn discover(&self) -> Vec<Toolset> {
        vec![kubernetes(), prometheus(), internet(), bash(), rabbitmq()]
    }
}

fn params_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null)
}

fn summarize_above(threshold: usize) -> TransformerSpec {
    TransformerSpec {
        name: LLM_SUMMARIZE.to_string(),
        config: json!({ "input_threshold": threshold }),
    }
}

/// Shared check for toolsets that need a base URL in their config.
fn url_configured(key: &'static str) -> Prerequisite {
    Prerequisite::callable(format!("config.{} is a valid URL", key), move |config| {
        let value = config
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default();
        if value.is_empty() {
            anyhow::bail!("config key '{}' is not set", key);
        }
        Url::parse(value)?;
        Ok(crate::toolset::CheckOutcome::pass())
    })
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct KubectlGetParams {
    /// Resource kind, e.g. "pods" or "deployments".
    kind: String,
    name: Option<String>,
    namespace: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct KubectlDescribeParams {
    kind: String,
    name: String,
    namespace: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct KubectlLogsParams {
    pod: String,
    namespace: Option<String>,
    container: Option<String>,
    /// Defaults to the last 100 lines.
    tail_lines: Option<u32>,
}

fn kubernetes() -> Toolset {
    Toolset::new(
        "kubernetes",
        "Inspect Kubernetes resources, events and pod logs (read-only)",
        ToolsetKind::Builtin,
    )
    .with_tags(vec![ToolsetTag::Core, ToolsetTag::Cli, ToolsetTag::Cluster])
    .with_prerequisites(vec![Prerequisite::command_expecting(
        "kubectl version --client",
        "Client Version",
    )])
    .with_tools(vec![
        Tool::new("kubectl_get", "List or fetch Kubernetes resources")
            .with_parameters(params_schema::<KubectlGetParams>()),
        Tool::new("kubectl_describe", "Describe one Kubernetes resource")
            .with_parameters(params_schema::<KubectlDescribeParams>()),
        Tool::new("kubectl_logs", "Fetch container logs from a pod")
            .with_parameters(params_schema::<KubectlLogsParams>()),
        Tool::new("kubectl_events", "Recent events for a namespace"),
    ])
    .with_transformers(vec![summarize_above(2000)])
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct PromqlRangeParams {
    query: String,
    /// RFC 3339 or relative like "-1h".
    start: Option<String>,
    end: Option<String>,
    step: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct PromqlInstantParams {
    query: String,
}

fn prometheus() -> Toolset {
    Toolset::new(
        "prometheus",
        "Run PromQL queries against the metrics backend",
        ToolsetKind::Builtin,
    )
    .with_tags(vec![ToolsetTag::Core, ToolsetTag::Cluster])
    .with_config(json!({ "url": "http://prometheus:9090" }))
    .with_prerequisites(vec![url_configured("url")])
    .with_tools(vec![
        Tool::new("promql_range", "Range query over a time window")
            .with_parameters(params_schema::<PromqlRangeParams>()),
        Tool::new("promql_instant", "Instant query at the current time")
            .with_parameters(params_schema::<PromqlInstantParams>()),
    ])
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct HttpFetchParams {
    url: String,
    /// GET unless stated otherwise.
    method: Option<String>,
}

fn internet() -> Toolset {
    Toolset::new(
        "internet",
        "Fetch web pages and API endpoints over HTTP",
        ToolsetKind::Builtin,
    )
    .with_tags(vec![ToolsetTag::Core, ToolsetTag::Cli])
    .with_tools(vec![Tool::new("http_fetch", "Fetch a URL and return the body")
        .with_parameters(params_schema::<HttpFetchParams>())
        .with_transformers(vec![summarize_above(4000)])])
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct RunScriptParams {
    script: String,
    timeout_seconds: Option<u64>,
}

fn bash() -> Toolset {
    Toolset::new(
        "bash",
        "Run read-only shell snippets on the operator host",
        ToolsetKind::Builtin,
    )
    .with_tags(vec![ToolsetTag::Cli])
    .with_tools(vec![Tool::new("run_script", "Execute a shell snippet")
        .with_parameters(params_schema::<RunScriptParams>())])
}

fn rabbitmq() -> Toolset {
    Toolset::new(
        "rabbitmq",
        "Inspect RabbitMQ cluster health and detect network partitions",
        ToolsetKind::Builtin,
    )
    .with_tags(vec![ToolsetTag::Cluster])
    .with_config(json!({ "management_url": "", "username": "guest", "password": "guest" }))
    .with_prerequisites(vec![url_configured("management_url")])
    .with_tools(vec![
        Tool::new(
            "rabbitmq_cluster_status",
            "Cluster overview: nodes, queues, running partitions",
        ),
        Tool::new(
            "rabbitmq_node_status",
            "Per-node health including detected network partitions",
        ),
    ])
    .with_transformers(vec![summarize_above(2000)])
}
