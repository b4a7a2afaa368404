pub mod builtin;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod metrics;
pub mod server;
pub mod template;
pub mod toolset;
pub mod transform;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("toolset names collide with builtin toolsets: {}", .0.join(", "))]
    Conflict(Vec<String>),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
