//! Toolset Status Cache
//!
//! Persists the outcome of a resolution pass so an unchanged configuration
//! set can skip re-running prerequisite checks on the next start. The file
//! is owned exclusively by this subsystem; concurrent writers race and the
//! last one wins, which is an accepted non-guarantee.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{ToolsetKind, ToolsetRegistry, ToolsetStatus};
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToolset {
    pub status: ToolsetStatus,
    pub enabled: bool,
    pub kind: ToolsetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// On-disk snapshot of one resolution pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    #[serde(rename = "_content_hash")]
    pub content_hash: String,
    #[serde(rename = "_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub toolsets: HashMap<String, CachedToolset>,
}

impl CacheSnapshot {
    /// Capture the registry's post-resolution state.
    pub fn capture(
        content_hash: String,
        registry: &ToolsetRegistry,
        default_enabled: bool,
    ) -> Self {
        let toolsets = registry
            .iter()
            .map(|toolset| {
                (
                    toolset.name.clone(),
                    CachedToolset {
                        status: toolset.status,
                        enabled: toolset.resolved_enabled(default_enabled),
                        kind: toolset.kind,
                        path: toolset.path.clone(),
                        error: toolset.error.clone(),
                    },
                )
            })
            .collect();
        Self {
            content_hash,
            timestamp: Utc::now(),
            toolsets,
        }
    }

    /// Read a snapshot from disk. A missing file yields `None`; a corrupt
    /// one is discarded with a warning rather than failing the load.
    pub fn load(path: &Path) -> Option<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read toolset cache");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding corrupt toolset cache");
                None
            }
        }
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "wrote toolset cache");
        Ok(())
    }

    /// Whether a previously-`enabled` entry may skip prerequisite checks.
    pub fn allows_skip(&self, name: &str) -> bool {
        self.toolsets
            .get(name)
            .map(|cached| cached.enabled && cached.status == ToolsetStatus::Enabled)
            .unwrap_or(false)
    }
}

/// Content hash of the resolved configuration set.
///
/// Covers everything that influences prerequisite outcomes: name, kind,
/// resolved enabled flag, tags, config, and instructions, sorted by name
/// so discovery order does not perturb the hash. Status fields are
/// deliberately excluded.
pub fn content_hash(registry: &ToolsetRegistry, default_enabled: bool) -> String {
    let mut projections: Vec<serde_json::Value> = registry
        .iter()
        .map(|toolset| {
            json!({
                "name": toolset.name,
                "kind": toolset.kind,
                "enabled": toolset.resolved_enabled(default_enabled),
                "tags": toolset.tags,
                "config": toolset.config,
                "additional_instructions": toolset.additional_instructions,
                "tools": toolset.tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
            })
        })
        .collect();
    projections.sort_by_key(|p| p["name"].as_str().unwrap_or_default().to_string());

    let serialized = serde_json::to_string(&projections).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}
