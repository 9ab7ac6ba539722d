//! ChatLink agent binary.
//!
//! Reads page events from stdin (see [`chatlink_agent::bridge`]) and keeps a
//! control channel to the local chat server open, forwarding chat entries
//! while the server has capture armed.
//!
//! Environment:
//! - `RUST_LOG`             log filter (default `info`)
//! - `CHATLINK_CONFIG`      optional JSON file with `AgentConfig` fields
//! - `CHATLINK_SERVER_URL`  overrides the server endpoint
//! - `CHATLINK_PAGE_PATH`   initial page path (default `/`)

use anyhow::{Context, Result};
use chatlink_agent::{Agent, HostBridge};
use chatlink_core::AgentConfig;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("ChatLink Agent v{}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(()) => {
            info!("ChatLink Agent exited cleanly.");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}

async fn run() -> Result<()> {
    let config = load_config()?;
    let initial_path = std::env::var("CHATLINK_PAGE_PATH").unwrap_or_else(|_| "/".to_owned());

    let (bridge, navigation_rx) = HostBridge::new(initial_path);
    let agent = Agent::new(config, bridge.page.clone(), bridge.observer.clone());
    let _pump = bridge.spawn_stdin();

    agent
        .run(navigation_rx, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Ctrl-C handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}

fn load_config() -> Result<AgentConfig> {
    let mut config = match std::env::var("CHATLINK_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path))?;
            serde_json::from_str::<AgentConfig>(&raw)
                .with_context(|| format!("parsing config file {}", path))?
        }
        Err(_) => AgentConfig::default(),
    };
    if let Ok(url) = std::env::var("CHATLINK_SERVER_URL") {
        config.server_url = url;
    }
    config.validate()?;
    Ok(config)
}
