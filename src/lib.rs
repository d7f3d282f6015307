pub mod access;
pub mod config;
pub mod error;
pub mod filter;
pub mod jsonrpc;
pub mod mcp;
pub mod proxy;
pub mod registry;
pub mod sse;
pub mod types;

use crate::access::{AccessService, StaticAccess};
use crate::config::ConfigManager;
use crate::proxy::server::{start_gateway, GatewayState};
use crate::registry::InMemoryRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Initialize tracing for the binaries
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Load the config, assemble the gateway state and serve until ctrl-c.
pub async fn run(config_path: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Starting MCP gateway");

    let config_manager = ConfigManager::new(config_path);
    let config = config_manager.load()?;
    ConfigManager::validate(&config).map_err(|e| anyhow::anyhow!("invalid config: {}", e))?;

    tracing::info!(
        "Loaded config: {} servers, {} grants, listen port {}",
        config.servers.len(),
        config.grants.len(),
        config.listen_port
    );

    let registry = Arc::new(InMemoryRegistry::new(config.servers.clone()));

    // No configured grants means no access service: every caller is allowed.
    let access: Option<Arc<dyn AccessService>> = if config.grants.is_empty() {
        None
    } else {
        Some(Arc::new(StaticAccess::new(config.grants.clone())))
    };

    let state = GatewayState::new(registry, access, &config)?;

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            token.cancel();
        }
    });

    start_gateway(config.listen_port, state, shutdown).await
}
