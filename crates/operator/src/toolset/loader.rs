//! Custom Toolset File Loader
//!
//! Parses operator-supplied YAML files into toolsets of kind `customized`,
//! plus `mcp_servers` sections (top-level or embedded in custom files) into
//! toolsets of kind `mcp`. `{{env.NAME}}` placeholders are substituted
//! throughout the document before any entry is parsed; a placeholder
//! referencing a missing variable fails the whole load.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use url::Url;

use super::prereq::PrerequisiteSpec;
use super::{merge_config, Tool, Toolset, ToolsetKind, ToolsetOverride, ToolsetTag, TransformerSpec};
use crate::{template, Error, Result};

/// One entry of an `mcp_servers` mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerEntry {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ToolsetDocument {
    #[serde(default)]
    toolsets: Option<HashMap<String, Value>>,
    #[serde(default)]
    mcp_servers: Option<HashMap<String, Value>>,
}

/// Full definition required for names not already known as builtins.
#[derive(Debug, Deserialize)]
struct CustomToolsetEntry {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    kind: Option<ToolsetKind>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    tags: Option<Vec<ToolsetTag>>,
    #[serde(default)]
    config: Option<Value>,
    #[serde(default)]
    prerequisites: Vec<PrerequisiteSpec>,
    #[serde(default)]
    tools: Vec<Tool>,
    #[serde(default)]
    transformers: Option<Vec<TransformerSpec>>,
    #[serde(default)]
    additional_instructions: Option<String>,
}

/// Result of loading one file: parsed toolsets plus any names that collided
/// with builtins. Collisions are collected rather than failing here so the
/// manager can report **every** offending name across all sources at once.
#[derive(Debug, Default)]
pub struct LoadedFile {
    pub toolsets: Vec<Toolset>,
    pub collisions: Vec<String>,
}

/// Load one custom toolset file.
///
/// Fatal: unreadable file, malformed YAML, or a document lacking both a
/// `toolsets` and an `mcp_servers` mapping. Non-fatal: a structurally
/// incomplete entry is skipped with a logged error.
pub fn load_file(path: &Path, builtin_names: &HashSet<String>) -> Result<LoadedFile> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "cannot read toolset file {}: {}",
            path.display(),
            e
        ))
    })?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&contents)?;
    let mut document = serde_json::to_value(yaml)?;
    template::substitute_env(&mut document)?;

    let document: ToolsetDocument = serde_json::from_value(document)?;
    if document.toolsets.is_none() && document.mcp_servers.is_none() {
        return Err(Error::Config(format!(
            "{} must define a top-level 'toolsets' or 'mcp_servers' mapping",
            path.display()
        )));
    }

    let mut loaded = LoadedFile::default();

    for (name, entry) in document.toolsets.unwrap_or_default() {
        if builtin_names.contains(&name) {
            loaded.collisions.push(name);
            continue;
        }
        if let Some(toolset) = parse_custom_entry(&name, entry, path) {
            loaded.toolsets.push(toolset);
        }
    }

    for (name, entry) in document.mcp_servers.unwrap_or_default() {
        if builtin_names.contains(&name) {
            loaded.collisions.push(name);
            continue;
        }
        let entry: McpServerEntry = match serde_json::from_value(entry) {
            Ok(entry) => entry,
            Err(e) => {
                error!(server = %name, path = %path.display(), error = %e,
                    "skipping malformed mcp_servers entry");
                continue;
            }
        };
        if let Some(toolset) = mcp_entry_to_toolset(&name, &entry, Some(path.to_path_buf())) {
            loaded.toolsets.push(toolset);
        }
    }

    debug!(
        path = %path.display(),
        toolsets = loaded.toolsets.len(),
        collisions = loaded.collisions.len(),
        "loaded toolset file"
    );
    Ok(loaded)
}

fn parse_custom_entry(name: &str, entry: Value, path: &Path) -> Option<Toolset> {
    let entry: CustomToolsetEntry = match serde_json::from_value(entry) {
        Ok(entry) => entry,
        Err(e) => {
            error!(toolset = %name, path = %path.display(), error = %e,
                "skipping malformed toolset entry");
            return None;
        }
    };

    // Names unknown to the builtin catalog must carry a full definition.
    let description = match entry.description.filter(|d| !d.is_empty()) {
        Some(description) => description,
        None => {
            error!(toolset = %name, path = %path.display(),
                "skipping toolset entry without a description");
            return None;
        }
    };
    if entry.tools.is_empty() {
        error!(toolset = %name, path = %path.display(),
            "skipping toolset entry without tools");
        return None;
    }

    let mut toolset = Toolset::new(
        name,
        description,
        entry.kind.unwrap_or(ToolsetKind::Customized),
    )
    .with_tools(entry.tools)
    .with_prerequisites(entry.prerequisites.into_iter().map(Into::into).collect())
    .with_path(path.to_path_buf());
    toolset.enabled = entry.enabled;
    if let Some(tags) = entry.tags {
        toolset.tags = tags;
    }
    if let Some(config) = entry.config {
        toolset.config = config;
    }
    toolset.transformers = entry.transformers;
    toolset.additional_instructions = entry.additional_instructions;
    Some(toolset)
}

/// Convert an `mcp_servers` entry into a toolset of kind `mcp`.
///
/// The server's tool list is discovered at runtime through the MCP
/// collaborator; here the entry only needs a valid URL.
pub fn mcp_entry_to_toolset(
    name: &str,
    entry: &McpServerEntry,
    path: Option<PathBuf>,
) -> Option<Toolset> {
    if let Err(e) = Url::parse(&entry.url) {
        error!(server = %name, url = %entry.url, error = %e,
            "skipping mcp_servers entry with invalid url");
        return None;
    }

    let description = entry
        .description
        .clone()
        .unwrap_or_else(|| format!("MCP server at {}", entry.url));
    let mut config = serde_json::json!({ "url": entry.url });
    if let Some(extra) = &entry.config {
        merge_config(&mut config, extra);
    }

    let mut toolset = Toolset::new(name, description, ToolsetKind::Mcp).with_config(config);
    toolset.path = path;
    Some(toolset)
}

/// The top-level MCP section of the operator config, substituted the same
/// way custom files are.
pub fn mcp_section(entries: &HashMap<String, McpServerEntry>) -> Result<Vec<Toolset>> {
    let mut toolsets = Vec::new();
    for (name, entry) in entries {
        let mut raw = serde_json::to_value(entry)?;
        template::substitute_env(&mut raw)?;
        let entry: McpServerEntry = serde_json::from_value(raw)?;
        if let Some(toolset) = mcp_entry_to_toolset(name, &entry, None) {
            toolsets.push(toolset);
        }
    }
    Ok(toolsets)
}

/// Operator config file carrying the generic `toolsets` override map and an
/// optional top-level `mcp_servers` section.
#[derive(Debug, Default, Deserialize)]
pub struct OverridesFile {
    #[serde(default)]
    pub toolsets: HashMap<String, ToolsetOverride>,
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerEntry>,
}

impl OverridesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        let yaml: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        let mut document = serde_json::to_value(yaml)?;
        template::substitute_env(&mut document)?;
        Ok(serde_json::from_value(document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn builtins(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_load_full_definition() {
        std::env::set_var("SLEUTH_LOADER_TOKEN", "s3cret");
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "custom.yaml",
            r#"
toolsets:
  grafana:
    description: "Query Grafana dashboards"
    tags: [core, cluster]
    config:
      url: "http://grafana:3000"
      api_key: "{{env.SLEUTH_LOADER_TOKEN}}"
    prerequisites:
      - env: ["GRAFANA_API_KEY"]
    tools:
      - name: grafana_search
        description: "Search dashboards by name"
"#,
        );

        let loaded = load_file(&path, &builtins(&["kubernetes"])).unwrap();
        assert!(loaded.collisions.is_empty());
        assert_eq!(loaded.toolsets.len(), 1);

        let grafana = &loaded.toolsets[0];
        assert_eq!(grafana.name, "grafana");
        assert_eq!(grafana.kind, ToolsetKind::Customized);
        assert_eq!(grafana.config["api_key"], "s3cret");
        assert_eq!(grafana.tools.len(), 1);
        assert_eq!(grafana.prerequisites.len(), 1);
        assert_eq!(grafana.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = load_file(Path::new("/no/such/file.yaml"), &builtins(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_document_without_known_sections_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "other.yaml", "something_else: true\n");
        let err = load_file(&path, &builtins(&[])).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("toolsets"));
        assert!(message.contains("mcp_servers"));
    }

    #[test]
    fn test_collisions_collect_every_builtin_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "colliding.yaml",
            r#"
toolsets:
  kubernetes:
    description: "shadowing"
    tools:
      - name: x
        description: y
  prometheus:
    description: "also shadowing"
    tools:
      - name: x
        description: y
  fresh:
    description: "legit"
    tools:
      - name: x
        description: y
"#,
        );

        let loaded = load_file(&path, &builtins(&["kubernetes", "prometheus"])).unwrap();
        let mut collisions = loaded.collisions.clone();
        collisions.sort();
        assert_eq!(collisions, vec!["kubernetes", "prometheus"]);
        assert_eq!(loaded.toolsets.len(), 1);
        assert_eq!(loaded.toolsets[0].name, "fresh");
    }

    #[test]
    fn test_incomplete_entry_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "partial.yaml",
            r#"
toolsets:
  no-tools:
    description: "defines nothing runnable"
  ok:
    description: "complete"
    tools:
      - name: probe
        description: "probe things"
"#,
        );

        let loaded = load_file(&path, &builtins(&[])).unwrap();
        let names: Vec<&str> = loaded.toolsets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[test]
    fn test_mcp_servers_inside_custom_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "mcp.yaml",
            r#"
mcp_servers:
  incident-db:
    url: "http://incident-db:8808/mcp"
    description: "Historical incident lookups"
    config:
      auth_header: "Bearer token"
  broken:
    url: "not a url"
"#,
        );

        let loaded = load_file(&path, &builtins(&[])).unwrap();
        assert_eq!(loaded.toolsets.len(), 1);
        let mcp = &loaded.toolsets[0];
        assert_eq!(mcp.name, "incident-db");
        assert_eq!(mcp.kind, ToolsetKind::Mcp);
        assert_eq!(mcp.config["url"], "http://incident-db:8808/mcp");
        assert_eq!(mcp.config["auth_header"], "Bearer token");
    }

    #[test]
    fn test_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "config.yaml",
            r#"
toolsets:
  kubernetes:
    enabled: false
    config:
      context: "staging"
mcp_servers:
  runbooks:
    url: "http://runbooks:9000/mcp"
"#,
        );

        let overrides = OverridesFile::load(&path).unwrap();
        assert_eq!(overrides.toolsets["kubernetes"].enabled, Some(false));
        assert_eq!(overrides.mcp_servers["runbooks"].url, "http://runbooks:9000/mcp");
    }
}
