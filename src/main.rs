//! Chat Gateway
//!
//! Exposes the chat backend's line protocol as an HTTP/JSON API for the
//! browser client.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                    CHAT GATEWAY                      │
//!                         │                                                      │
//!   Browser  ─── HTTP ───▶│  ┌──────────┐   ┌──────────┐   ┌─────────────────┐   │
//!                         │  │  http    │──▶│ security │──▶│    handlers     │   │
//!                         │  │ server   │   │ identity │   │ (validate/map)  │   │
//!                         │  └──────────┘   └──────────┘   └───────┬─────────┘   │
//!                         │                                        │             │
//!                         │                                        ▼             │
//!                         │  ┌──────────┐   ┌──────────┐   ┌─────────────────┐   │
//!   Browser  ◀── JSON ────│  │ history  │◀──│  frame   │◀──│ gateway client  │◀──┼── TCP ── Chat
//!                         │  │ parser   │   │  codec   │   │ (1 socket/call) │───┼── line ─ Backend
//!                         │  └──────────┘   └──────────┘   └─────────────────┘   │
//!                         │                                                      │
//!                         │  config (hot reload) · observability · lifecycle     │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use chat_gateway::config::{apply_overrides, load_config, watcher::ConfigWatcher, GatewayConfig, Overrides};
use chat_gateway::http::HttpServer;
use chat_gateway::lifecycle::{wait_for_signal, Shutdown};
use chat_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "chat-gateway")]
#[command(about = "HTTP gateway for the TCP chat backend", long_about = None)]
struct Cli {
    /// TOML configuration file (watched for changes).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the chat backend address.
    #[arg(long)]
    backend: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = Overrides {
        bind_address: cli.bind,
        backend_address: cli.backend,
    };
    let file_config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    let config = apply_overrides(file_config, &overrides)?;

    logging::init_logging(&config.observability);

    tracing::info!("chat-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.address,
        call_timeout_secs = config.timeouts.call_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher must outlive the server.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, &config, overrides);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    HttpServer::new(config)
        .run(listener, config_updates, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
