use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use sleuth_operator::{
    builtin::BundledToolsets,
    config::{Config, RunMode},
    mcp::HttpMcpProbe,
    metrics,
    server::Server,
    toolset::{loader::OverridesFile, ToolsetManager},
    transform::TransformerRegistry,
    Result,
};

#[derive(Parser, Debug)]
#[command(name = "sleuth-operator", about = "AI troubleshooting operator")]
struct Cli {
    /// Run mode: console or server. Overrides SLEUTH_MODE.
    #[arg(long)]
    mode: Option<String>,

    /// Custom toolset definition file, repeatable.
    #[arg(long = "toolset-file")]
    toolset_files: Vec<PathBuf>,

    /// Operator config file with toolset overrides and mcp_servers.
    #[arg(long = "config-file")]
    config_file: Option<PathBuf>,

    /// Ignore the toolset cache and re-run every prerequisite check.
    #[arg(long)]
    refresh: bool,

    /// Fleet-wide fast model for summarizing transformers.
    #[arg(long = "fast-model")]
    fast_model: Option<String>,

    /// Listen address for server mode.
    #[arg(long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();
    metrics::register_metrics();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(mode) = &cli.mode {
        config.mode = match mode.to_lowercase().as_str() {
            "server" => RunMode::Server,
            _ => RunMode::Console,
        };
    }
    if !cli.toolset_files.is_empty() {
        config.toolsets.custom_files = cli.toolset_files.clone();
    }
    if let Some(path) = &cli.config_file {
        config.toolsets.config_file = Some(path.clone());
    }
    if let Some(model) = &cli.fast_model {
        config.toolsets.fallback_model = Some(model.clone());
    }
    if let Some(addr) = &cli.addr {
        config.server.addr = addr.clone();
    }
    info!("Loaded configuration: {:?}", config);

    let overrides = match &config.toolsets.config_file {
        Some(path) => OverridesFile::load(path)?,
        None => OverridesFile::default(),
    };

    let transformers = Arc::new(TransformerRegistry::with_defaults(config.llm.clone()));
    let mut manager = ToolsetManager::new(
        Arc::new(BundledToolsets),
        Arc::new(HttpMcpProbe::new()),
        transformers,
    )
    .with_tag_filter(config.mode.tag_filter())
    .with_default_enabled(config.mode.default_enabled())
    .with_custom_files(config.toolsets.custom_files.clone())
    .with_overrides(overrides.toolsets)
    .with_mcp_servers(overrides.mcp_servers)
    .with_cache_path(config.toolsets.cache_path.clone());
    if let Some(allowlist) = config.toolsets.builtin_allowlist.clone() {
        manager = manager.with_builtin_allowlist(allowlist);
    }
    if let Some(model) = config.toolsets.fallback_model.clone() {
        manager = manager.with_fallback_model(model);
    }

    let refresh = cli.refresh || config.mode.always_refresh();
    manager.resolve(refresh).await?;

    match config.mode {
        RunMode::Console => {
            for summary in manager.summaries() {
                match &summary.error {
                    Some(error) => println!(
                        "{:<16} {:<10} {:?}  {}",
                        summary.name,
                        format!("{:?}", summary.status).to_lowercase(),
                        summary.kind,
                        error
                    ),
                    None => println!(
                        "{:<16} {:<10} {:?}  ({} tools)",
                        summary.name,
                        format!("{:?}", summary.status).to_lowercase(),
                        summary.kind,
                        summary.tool_count
                    ),
                }
            }
        }
        RunMode::Server => {
            let manager = Arc::new(RwLock::new(manager));
            let server = Server::new(&config, manager);
            info!("Starting server on {}", config.server.addr);
            server.start(&config.server.addr).await?;
        }
    }

    Ok(())
}
