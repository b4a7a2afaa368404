use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::llm::LlmConfig;
use crate::toolset::ToolsetTag;

/// Caller-facing modes. Console trusts the cache and enables toolsets by
/// default; server always refreshes and only enables what the operator
/// allow-listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    #[serde(rename = "console")]
    Console,
    #[serde(rename = "server")]
    Server,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Console
    }
}

impl RunMode {
    pub fn default_enabled(self) -> bool {
        matches!(self, RunMode::Console)
    }

    pub fn tag_filter(self) -> Vec<ToolsetTag> {
        match self {
            RunMode::Console => vec![ToolsetTag::Core, ToolsetTag::Cli],
            RunMode::Server => vec![ToolsetTag::Core, ToolsetTag::Cluster],
        }
    }

    pub fn always_refresh(self) -> bool {
        matches!(self, RunMode::Server)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mode: RunMode,
    pub server: ServerConfig,
    pub toolsets: ToolsetConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsetConfig {
    /// Custom toolset definition files, loaded in order.
    pub custom_files: Vec<PathBuf>,
    /// Operator config file with the `toolsets` override map and the
    /// top-level `mcp_servers` section.
    pub config_file: Option<PathBuf>,
    pub cache_path: PathBuf,
    pub builtin_allowlist: Option<Vec<String>>,
    /// Fleet-wide fast model injected into summarizing transformers that
    /// do not pick their own.
    pub fallback_model: Option<String>,
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Config {
            mode: match std::env::var("SLEUTH_MODE")
                .unwrap_or_else(|_| "console".to_string())
                .to_lowercase()
                .as_str()
            {
                "server" => RunMode::Server,
                _ => RunMode::Console,
            },
            server: ServerConfig {
                addr: std::env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            },
            toolsets: ToolsetConfig {
                custom_files: std::env::var("SLEUTH_TOOLSET_FILES")
                    .map(|files| files.split(':').map(PathBuf::from).collect())
                    .unwrap_or_default(),
                config_file: std::env::var("SLEUTH_CONFIG_FILE").map(PathBuf::from).ok(),
                cache_path: std::env::var("SLEUTH_TOOLSET_CACHE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("data/toolset-cache.json")),
                builtin_allowlist: std::env::var("SLEUTH_BUILTIN_ALLOWLIST")
                    .map(|names| {
                        names
                            .split(',')
                            .map(|name| name.trim().to_string())
                            .filter(|name| !name.is_empty())
                            .collect()
                    })
                    .ok(),
                fallback_model: std::env::var("SLEUTH_FAST_MODEL").ok(),
            },
            llm: LlmConfig {
                provider: std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "anthropic".to_string()),
                model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "claude-3-haiku".to_string()),
                api_key: std::env::var("LLM_API_KEY").ok().filter(|key| !key.is_empty()),
            },
        };

        if config.llm.api_key.is_none() {
            tracing::warn!("LLM_API_KEY is not set. Summarizing transformers may not work.");
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: RunMode::Console,
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
            toolsets: ToolsetConfig {
                custom_files: Vec::new(),
                config_file: None,
                cache_path: PathBuf::from("data/toolset-cache.json"),
                builtin_allowlist: None,
                fallback_model: None,
            },
            llm: LlmConfig::default(),
        }
    }
}
