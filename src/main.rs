/// MCP Weather Server Entry Point
///
/// Loads the layered configuration (see `core::config`), sets up logging on
/// stderr and starts the selected transport. stdout is reserved for the
/// JSON-RPC stream in STDIO mode.

mod core;
mod tools;

use tracing_subscriber::EnvFilter;

use crate::core::config::{ServerConfig, Transport};
use crate::core::server::{self, AppState};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_logging();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let registry = server::initialize_tools();
    let state = AppState::from(&config);

    let result = match config.transport {
        Transport::Stdio => server::run_server_stdio(state, registry).await,
        Transport::Http => server::run_server_http(config, registry).await,
        Transport::Both => {
            // STDIO in the background, HTTP in the foreground
            let stdio_registry = registry.clone();
            let stdio_handle = tokio::spawn(async move {
                if let Err(e) = server::run_server_stdio(state, stdio_registry).await {
                    tracing::error!(error = %e, "STDIO server error");
                }
            });

            let http_result = server::run_server_http(config, registry).await;
            stdio_handle.abort();
            http_result
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "server stopped with error");
    }
    result
}
