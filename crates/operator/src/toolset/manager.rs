//! Toolset Manager
//!
//! Orchestrates discovery (builtin + custom file + MCP sources), override
//! merging, tag filtering, prerequisite execution, fast-model injection and
//! cache read/write. Owns the registry for its whole lifetime and hands
//! out read access to callers.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cache::{self, CacheSnapshot};
use super::loader::{self, McpServerEntry};
use super::prereq;
use super::{Toolset, ToolsetKind, ToolsetOverride, ToolsetRegistry, ToolsetStatus, ToolsetSummary, ToolsetTag};
use crate::builtin::BuiltinSource;
use crate::mcp::McpProbe;
use crate::metrics::{PREREQ_FAILURES_TOTAL, TOOLSETS_ENABLED, TOOLSETS_FAILED};
use crate::transform::{self, ResolvedTool, TransformerRegistry};
use crate::{Error, Result};

pub struct ToolsetManager {
    builtin_source: Arc<dyn BuiltinSource>,
    mcp_probe: Arc<dyn McpProbe>,
    transformers: Arc<TransformerRegistry>,
    tag_filter: Vec<ToolsetTag>,
    overrides: HashMap<String, ToolsetOverride>,
    custom_files: Vec<PathBuf>,
    mcp_servers: HashMap<String, McpServerEntry>,
    cache_path: Option<PathBuf>,
    default_enabled: bool,
    builtin_allowlist: Option<Vec<String>>,
    fallback_model: Option<String>,
    registry: ToolsetRegistry,
    resolved: HashMap<String, Vec<ResolvedTool>>,
}

impl ToolsetManager {
    pub fn new(
        builtin_source: Arc<dyn BuiltinSource>,
        mcp_probe: Arc<dyn McpProbe>,
        transformers: Arc<TransformerRegistry>,
    ) -> Self {
        Self {
            builtin_source,
            mcp_probe,
            transformers,
            tag_filter: Vec::new(),
            overrides: HashMap::new(),
            custom_files: Vec::new(),
            mcp_servers: HashMap::new(),
            cache_path: None,
            default_enabled: true,
            builtin_allowlist: None,
            fallback_model: None,
            registry: ToolsetRegistry::new(),
            resolved: HashMap::new(),
        }
    }

    pub fn with_tag_filter(mut self, tags: Vec<ToolsetTag>) -> Self {
        self.tag_filter = tags;
        self
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, ToolsetOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_custom_files(mut self, paths: Vec<PathBuf>) -> Self {
        self.custom_files = paths;
        self
    }

    pub fn with_mcp_servers(mut self, servers: HashMap<String, McpServerEntry>) -> Self {
        self.mcp_servers = servers;
        self
    }

    pub fn with_cache_path(mut self, path: PathBuf) -> Self {
        self.cache_path = Some(path);
        self
    }

    pub fn with_default_enabled(mut self, default_enabled: bool) -> Self {
        self.default_enabled = default_enabled;
        self
    }

    pub fn with_builtin_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.builtin_allowlist = Some(allowlist);
        self
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = Some(model.into());
        self
    }

    /// Run one full resolution pass. With `refresh` set, the cache is
    /// ignored and every enabled toolset re-runs its prerequisite checks.
    pub async fn resolve(&mut self, refresh: bool) -> Result<()> {
        let pass = Uuid::new_v4();
        info!(%pass, refresh, "resolving toolsets");

        // Builtin discovery, allow-list applied by exact name.
        let mut registry = ToolsetRegistry::new();
        registry.add(self.discover_builtins());

        // Generic overrides only touch entries that already exist.
        registry.update_from_config(&self.overrides);

        // Custom files and MCP sections may add new toolsets but never
        // shadow a builtin; collisions are collected across every source
        // so the error names all of them.
        let builtin_names: HashSet<String> = registry.names().into_iter().collect();
        let mut discovered: Vec<Toolset> = Vec::new();
        let mut collisions: Vec<String> = Vec::new();

        for path in &self.custom_files {
            let loaded = loader::load_file(path, &builtin_names)?;
            discovered.extend(loaded.toolsets);
            collisions.extend(loaded.collisions);
        }
        for toolset in loader::mcp_section(&self.mcp_servers)? {
            if builtin_names.contains(&toolset.name) {
                collisions.push(toolset.name);
            } else {
                discovered.push(toolset);
            }
        }
        if !collisions.is_empty() {
            collisions.sort();
            collisions.dedup();
            return Err(Error::Conflict(collisions));
        }
        registry.add(discovered);

        registry.retain_by_tags(&self.tag_filter);

        // A cache snapshot is only trusted when the resolved configuration
        // set hashes to the same value it was captured from; an explicit
        // override always wins because it participates in that hash.
        let content_hash = cache::content_hash(&registry, self.default_enabled);
        let snapshot = if refresh {
            None
        } else {
            self.cache_path
                .as_deref()
                .and_then(CacheSnapshot::load)
                .filter(|s| {
                    let valid = s.content_hash == content_hash;
                    if !valid {
                        debug!("toolset cache is stale, re-running checks");
                    }
                    valid
                })
        };

        let mut skipped = 0usize;
        for name in registry.names() {
            let Some(toolset) = registry.get_mut(&name) else {
                continue;
            };
            if !toolset.resolved_enabled(self.default_enabled) {
                toolset.status = ToolsetStatus::Disabled;
                toolset.error = None;
                continue;
            }
            if let Some(snapshot) = &snapshot {
                if snapshot.allows_skip(&name) {
                    toolset.status = ToolsetStatus::Enabled;
                    toolset.error = None;
                    skipped += 1;
                    continue;
                }
            }
            prereq::check_toolset(toolset, self.default_enabled).await;

            // MCP toolsets additionally answer the probe's health contract.
            if toolset.status == ToolsetStatus::Enabled && toolset.kind == ToolsetKind::Mcp {
                let url = toolset.config["url"].as_str().unwrap_or_default().to_string();
                if let Err(e) = self.mcp_probe.check_health(&url).await {
                    PREREQ_FAILURES_TOTAL.inc();
                    toolset.status = ToolsetStatus::Failed;
                    toolset.error = Some(format!("MCP server unreachable: {}", e));
                }
            }
        }

        if let Some(model) = &self.fallback_model {
            transform::inject_fast_model(&mut registry, model);
        }

        let enabled = registry
            .iter()
            .filter(|t| t.status == ToolsetStatus::Enabled)
            .count();
        let failed = registry
            .iter()
            .filter(|t| t.status == ToolsetStatus::Failed)
            .count();
        TOOLSETS_ENABLED.set(enabled as i64);
        TOOLSETS_FAILED.set(failed as i64);

        if let Some(path) = &self.cache_path {
            let snapshot = CacheSnapshot::capture(content_hash, &registry, self.default_enabled);
            if let Err(e) = snapshot.store(path) {
                warn!(path = %path.display(), error = %e, "failed to write toolset cache");
            }
        }

        // Second construction phase: instantiate and cache the transformer
        // chain of every tool belonging to an enabled toolset.
        let mut resolved = HashMap::new();
        for toolset in registry.iter().filter(|t| t.status == ToolsetStatus::Enabled) {
            let tools: Vec<ResolvedTool> = toolset
                .tools
                .iter()
                .map(|tool| ResolvedTool::resolve(tool, toolset, &self.transformers))
                .collect();
            resolved.insert(toolset.name.clone(), tools);
        }

        info!(
            %pass,
            total = registry.len(),
            enabled,
            failed,
            cache_skipped = skipped,
            "toolset resolution complete"
        );
        self.registry = registry;
        self.resolved = resolved;
        Ok(())
    }

    fn discover_builtins(&self) -> Vec<Toolset> {
        let mut builtins = self.builtin_source.discover();
        if let Some(allowlist) = &self.builtin_allowlist {
            let known: HashSet<String> = builtins.iter().map(|t| t.name.clone()).collect();
            let unmatched: Vec<&str> = allowlist
                .iter()
                .filter(|name| !known.contains(name.as_str()))
                .map(String::as_str)
                .collect();
            if !unmatched.is_empty() {
                warn!(
                    "builtin allow-list entries matched no toolset: {}",
                    unmatched.join(", ")
                );
            }
            builtins.retain(|t| allowlist.contains(&t.name));
        }
        builtins
    }

    pub fn registry(&self) -> &ToolsetRegistry {
        &self.registry
    }

    pub fn summaries(&self) -> Vec<ToolsetSummary> {
        self.registry.iter().map(Toolset::summary).collect()
    }

    /// Resolved tools of one enabled toolset.
    pub fn resolved_tools(&self, toolset: &str) -> Option<&[ResolvedTool]> {
        self.resolved.get(toolset).map(Vec::as_slice)
    }

    /// Every resolved tool across enabled toolsets, in discovery order.
    pub fn all_resolved_tools(&self) -> Vec<&ResolvedTool> {
        self.registry
            .iter()
            .filter_map(|toolset| self.resolved.get(&toolset.name))
            .flatten()
            .collect()
    }
}
