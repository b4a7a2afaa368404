//! Toolset Entity Model
//!
//! Pure data types shared by the registry, loader, prerequisite checker and
//! manager. A `Toolset` is a named, taggable bundle of LLM-facing tools with
//! its own configuration and prerequisite state.

pub mod cache;
pub mod loader;
pub mod manager;
pub mod prereq;
pub mod registry;

pub use cache::CacheSnapshot;
pub use loader::McpServerEntry;
pub use manager::ToolsetManager;
pub use prereq::{CheckOutcome, Prerequisite};
pub use registry::ToolsetRegistry;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Where a toolset definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolsetKind {
    Builtin,
    Customized,
    Mcp,
}

/// Outcome of prerequisite checking for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolsetStatus {
    Unknown,
    Enabled,
    Disabled,
    Failed,
}

/// Coarse capability tags used by the caller-facing modes to select
/// toolsets (console filters {core, cli}, server filters {core, cluster}).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolsetTag {
    Core,
    Cli,
    Cluster,
}

/// Declarative reference to an output transformer: a registered name plus a
/// parameter mapping. Instantiation happens later, once per tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerSpec {
    pub name: String,
    #[serde(default = "empty_object")]
    pub config: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Single invocable capability belonging to a toolset.
///
/// Declarative only; the instantiated transformer chain lives on
/// [`crate::transform::ResolvedTool`], produced in a second construction
/// phase so this value never mutates after discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's input parameters.
    #[serde(default = "default_parameters")]
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformers: Option<Vec<TransformerSpec>>,
}

fn default_parameters() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: default_parameters(),
            transformers: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_transformers(mut self, transformers: Vec<TransformerSpec>) -> Self {
        self.transformers = Some(transformers);
        self
    }
}

/// Named, taggable bundle of related tools with its own config and
/// prerequisite state.
///
/// Constructed once per resolution pass from a discovery source, mutated in
/// place only by override-merge and by prerequisite checking (status and
/// error fields), then kept for the process lifetime.
#[derive(Debug, Clone)]
pub struct Toolset {
    pub name: String,
    pub description: String,
    pub kind: ToolsetKind,
    /// Explicit enabled flag. `None` means "follow the mode default".
    pub enabled: Option<bool>,
    pub tags: Vec<ToolsetTag>,
    /// Arbitrary nested configuration, merged recursively by overrides.
    pub config: Value,
    pub prerequisites: Vec<Prerequisite>,
    pub tools: Vec<Tool>,
    /// Toolset-level transformer list, inherited by tools that do not
    /// declare their own.
    pub transformers: Option<Vec<TransformerSpec>>,
    /// Extra guidance appended to the LLM system prompt for this toolset.
    pub additional_instructions: Option<String>,
    pub status: ToolsetStatus,
    pub error: Option<String>,
    /// File the definition was loaded from, if any.
    pub path: Option<PathBuf>,
}

impl Toolset {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ToolsetKind,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            enabled: None,
            tags: vec![ToolsetTag::Core],
            config: empty_object(),
            prerequisites: Vec::new(),
            tools: Vec::new(),
            transformers: None,
            additional_instructions: None,
            status: ToolsetStatus::Unknown,
            error: None,
            path: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<ToolsetTag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_prerequisites(mut self, prerequisites: Vec<Prerequisite>) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_transformers(mut self, transformers: Vec<TransformerSpec>) -> Self {
        self.transformers = Some(transformers);
        self
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Effective enabled flag: an explicit setting always dominates the
    /// mode default.
    pub fn resolved_enabled(&self, default_enabled: bool) -> bool {
        self.enabled.unwrap_or(default_enabled)
    }

    /// True when the tag sets intersect. An empty filter matches everything.
    pub fn has_any_tag(&self, tags: &[ToolsetTag]) -> bool {
        tags.is_empty() || self.tags.iter().any(|t| tags.contains(t))
    }

    /// Field-level override-merge: explicit `enabled` wins, `config` merges
    /// recursively, `additional_instructions` replaces.
    pub fn apply_override(&mut self, ov: &ToolsetOverride) {
        if let Some(enabled) = ov.enabled {
            self.enabled = Some(enabled);
        }
        if let Some(config) = &ov.config {
            merge_config(&mut self.config, config);
        }
        if let Some(instructions) = &ov.additional_instructions {
            self.additional_instructions = Some(instructions.clone());
        }
    }

    pub fn summary(&self) -> ToolsetSummary {
        ToolsetSummary {
            name: self.name.clone(),
            kind: self.kind,
            status: self.status,
            tags: self.tags.clone(),
            tool_count: self.tools.len(),
            error: self.error.clone(),
            path: self.path.clone(),
        }
    }
}

/// Serializable status view of a toolset, returned by the status server.
#[derive(Debug, Clone, Serialize)]
pub struct ToolsetSummary {
    pub name: String,
    pub kind: ToolsetKind,
    pub status: ToolsetStatus,
    pub tags: Vec<ToolsetTag>,
    pub tool_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Per-toolset entry of the generic override map.
///
/// `config` distinguishes "absent" (key not given, existing values kept)
/// from an explicit `null` (config replaced wholesale); the two are
/// observably different.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsetOverride {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, deserialize_with = "explicit_value")]
    pub config: Option<Value>,
    #[serde(default)]
    pub additional_instructions: Option<String>,
}

fn explicit_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    // Plain Option<Value> maps an explicit null to None, losing the
    // distinction from an absent key. Wrap whatever is present, null
    // included.
    Value::deserialize(deserializer).map(Some)
}

/// Recursive override merge. Keys absent from the overlay are preserved
/// from the base at every depth; any non-object overlay value (null
/// included) replaces the base value outright.
pub fn merge_config(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_config(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_preserves_absent_keys_at_depth() {
        let mut base = json!({
            "url": "http://default",
            "auth": { "user": "sleuth", "timeout": 30 }
        });
        merge_config(&mut base, &json!({ "auth": { "user": "ops" } }));
        assert_eq!(base["url"], "http://default");
        assert_eq!(base["auth"]["user"], "ops");
        assert_eq!(base["auth"]["timeout"], 30);
    }

    #[test]
    fn test_merge_empty_object_is_noop() {
        let mut base = json!({ "url": "http://default", "timeout": 30 });
        let before = base.clone();
        merge_config(&mut base, &json!({}));
        assert_eq!(base, before);
    }

    #[test]
    fn test_merge_null_replaces_whole_config() {
        let mut base = json!({ "url": "http://default" });
        merge_config(&mut base, &Value::Null);
        assert_eq!(base, Value::Null);
    }

    #[test]
    fn test_override_distinguishes_empty_from_null() {
        let empty: ToolsetOverride = serde_yaml::from_str("config: {}").unwrap();
        let null: ToolsetOverride = serde_yaml::from_str("config: null").unwrap();
        let absent: ToolsetOverride = serde_yaml::from_str("enabled: true").unwrap();

        assert_eq!(empty.config, Some(json!({})));
        assert_eq!(null.config, Some(Value::Null));
        assert!(absent.config.is_none());

        let mut with_empty = Toolset::new("a", "", ToolsetKind::Builtin)
            .with_config(json!({ "url": "http://default" }));
        with_empty.apply_override(&empty);
        assert_eq!(with_empty.config, json!({ "url": "http://default" }));

        let mut with_null = Toolset::new("a", "", ToolsetKind::Builtin)
            .with_config(json!({ "url": "http://default" }));
        with_null.apply_override(&null);
        assert_eq!(with_null.config, Value::Null);
    }

    #[test]
    fn test_explicit_enabled_beats_default() {
        let mut toolset = Toolset::new("x", "", ToolsetKind::Builtin);
        assert!(toolset.resolved_enabled(true));
        assert!(!toolset.resolved_enabled(false));

        toolset.apply_override(&ToolsetOverride {
            enabled: Some(false),
            ..Default::default()
        });
        assert!(!toolset.resolved_enabled(true));
    }

    #[test]
    fn test_tag_intersection() {
        let toolset =
            Toolset::new("x", "", ToolsetKind::Builtin).with_tags(vec![ToolsetTag::Cli]);
        assert!(toolset.has_any_tag(&[ToolsetTag::Core, ToolsetTag::Cli]));
        assert!(!toolset.has_any_tag(&[ToolsetTag::Cluster]));
        assert!(toolset.has_any_tag(&[]));
    }
}
