//! scan-gateway
//!
//! Authenticated front door for LLM-backed code scanning.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────────────┐
//!                     │                     SCAN GATEWAY                       │
//!                     │                                                        │
//!   Browser login ────┼─▶ http::auth ──▶ auth::provider ──▶ auth::rotation ───┼──▶ store
//!                     │                                       │                │
//!                     │                                       ▼                │
//!   ◀── 302 + token ──┼──────────────────────────────── auth::token           │
//!                     │                                                        │
//!   POST /api/scan ───┼─▶ authenticate ──▶ rate_limit ──▶ http::scan          │
//!                     │        │                │              │               │
//!                     │        ▼                ▼              ▼               │
//!                     │      store            store     analysis::pipeline ───┼──▶ model provider
//!                     │                                                        │
//!                     │  config · observability · lifecycle                    │
//!                     └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use scan_gateway::config::load_config;
use scan_gateway::observability::{logging, metrics};
use scan_gateway::{HttpServer, Shutdown, Stores};

#[derive(Parser)]
#[command(name = "scan-gateway")]
#[command(about = "Authenticated code-scanning gateway", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long, env = "SCAN_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging("scan_gateway=info");
            tracing::error!(error = %e, "Configuration rejected");
            return Err(e.into());
        }
    };

    logging::init_logging(&config.observability.log_filter);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "scan-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        primary_model = %config.analysis.primary_model,
        fallback_model = %config.analysis.fallback_model,
        redis = config.store.redis_url.is_some(),
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

    let stores = Stores::from_config(&config.store).await?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, stores)?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { shutdown.trigger_on_ctrl_c().await }
    });

    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
