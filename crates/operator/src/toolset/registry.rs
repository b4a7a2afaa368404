//! Toolset Registry
//!
//! In-memory, name-keyed store with add/merge semantics. The registry is an
//! explicit value owned by the manager (no global state), and it
//! preserves discovery order for every read path.

use std::collections::HashMap;
use tracing::warn;

use super::{Toolset, ToolsetOverride, ToolsetTag};

#[derive(Debug, Default)]
pub struct ToolsetRegistry {
    entries: HashMap<String, Toolset>,
    /// Names in original discovery order.
    order: Vec<String>,
}

impl ToolsetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unseen names, preserving discovery order. A name already
    /// present is not replaced: its entry receives a field-level
    /// override-merge of the incoming definition's explicit `enabled`,
    /// config and additional instructions.
    pub fn add(&mut self, toolsets: Vec<Toolset>) {
        for toolset in toolsets {
            match self.entries.get_mut(&toolset.name) {
                Some(existing) => {
                    existing.apply_override(&ToolsetOverride {
                        enabled: toolset.enabled,
                        config: Some(toolset.config.clone()),
                        additional_instructions: toolset.additional_instructions.clone(),
                    });
                }
                None => {
                    self.order.push(toolset.name.clone());
                    self.entries.insert(toolset.name.clone(), toolset);
                }
            }
        }
    }

    /// Merge the generic override map onto entries present in **both** the
    /// registry and the map. Names only in the map are ignored; generic
    /// config cannot create toolsets, only discovery sources can.
    pub fn update_from_config(&mut self, overrides: &HashMap<String, ToolsetOverride>) {
        for (name, ov) in overrides {
            match self.entries.get_mut(name) {
                Some(toolset) => toolset.apply_override(ov),
                None => warn!(toolset = %name, "override refers to an unknown toolset, ignoring"),
            }
        }
    }

    /// Entries whose tag set intersects the filter, in discovery order.
    pub fn get_by_tags(&self, tags: &[ToolsetTag]) -> Vec<&Toolset> {
        self.iter().filter(|t| t.has_any_tag(tags)).collect()
    }

    /// Drop every entry whose tag set does not intersect the filter.
    /// An empty filter keeps everything.
    pub fn retain_by_tags(&mut self, tags: &[ToolsetTag]) {
        if tags.is_empty() {
            return;
        }
        let entries = &mut self.entries;
        self.order.retain(|name| {
            let keep = entries
                .get(name)
                .map(|t| t.has_any_tag(tags))
                .unwrap_or(false);
            if !keep {
                entries.remove(name);
            }
            keep
        });
    }

    pub fn get(&self, name: &str) -> Option<&Toolset> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Toolset> {
        self.entries.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Iterate in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &Toolset> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    /// Mutable iteration, order not guaranteed.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Toolset> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolset::ToolsetKind;
    use serde_json::json;

    fn toolset(name: &str, tags: Vec<ToolsetTag>) -> Toolset {
        Toolset::new(name, format!("{} toolset", name), ToolsetKind::Builtin).with_tags(tags)
    }

    #[test]
    fn test_add_preserves_discovery_order() {
        let mut registry = ToolsetRegistry::new();
        registry.add(vec![
            toolset("kubernetes", vec![ToolsetTag::Core]),
            toolset("prometheus", vec![ToolsetTag::Core]),
            toolset("bash", vec![ToolsetTag::Cli]),
        ]);
        let names: Vec<&str> = registry.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["kubernetes", "prometheus", "bash"]);
    }

    #[test]
    fn test_add_merges_duplicates_instead_of_replacing() {
        let mut registry = ToolsetRegistry::new();
        registry.add(vec![toolset("kubernetes", vec![ToolsetTag::Core])
            .with_config(json!({ "url": "http://default", "timeout": 30 }))]);
        registry.add(vec![toolset("kubernetes", vec![ToolsetTag::Core])
            .with_config(json!({ "url": "http://custom" }))
            .with_enabled(false)]);

        assert_eq!(registry.len(), 1);
        let merged = registry.get("kubernetes").unwrap();
        assert_eq!(merged.config["url"], "http://custom");
        assert_eq!(merged.config["timeout"], 30);
        assert_eq!(merged.enabled, Some(false));
    }

    #[test]
    fn test_update_from_config_ignores_unknown_names() {
        let mut registry = ToolsetRegistry::new();
        registry.add(vec![
            toolset("prometheus", vec![ToolsetTag::Core])
                .with_config(json!({ "url": "http://prom:9090" })),
        ]);

        let mut overrides = HashMap::new();
        overrides.insert(
            "prometheus".to_string(),
            ToolsetOverride {
                config: Some(json!({ "url": "http://thanos:9090" })),
                ..Default::default()
            },
        );
        overrides.insert(
            "no-such-toolset".to_string(),
            ToolsetOverride {
                enabled: Some(true),
                ..Default::default()
            },
        );

        registry.update_from_config(&overrides);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("prometheus").unwrap().config["url"],
            "http://thanos:9090"
        );
        assert!(!registry.contains("no-such-toolset"));
    }

    #[test]
    fn test_get_by_tags_in_discovery_order() {
        let mut registry = ToolsetRegistry::new();
        registry.add(vec![
            toolset("kubernetes", vec![ToolsetTag::Core]),
            toolset("bash", vec![ToolsetTag::Cli]),
            toolset("rabbitmq", vec![ToolsetTag::Cluster]),
        ]);

        let cli: Vec<&str> = registry
            .get_by_tags(&[ToolsetTag::Core, ToolsetTag::Cli])
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(cli, vec!["kubernetes", "bash"]);
    }

    #[test]
    fn test_retain_by_tags() {
        let mut registry = ToolsetRegistry::new();
        registry.add(vec![
            toolset("kubernetes", vec![ToolsetTag::Core]),
            toolset("bash", vec![ToolsetTag::Cli]),
        ]);
        registry.retain_by_tags(&[ToolsetTag::Core]);
        assert_eq!(registry.names(), vec!["kubernetes".to_string()]);

        registry.retain_by_tags(&[]);
        assert_eq!(registry.len(), 1);
    }
}
