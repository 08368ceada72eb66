//! MCP HTTP transport (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────────────┐
//!                    │                   MCP HTTP BRIDGE                      │
//!                    │                                                        │
//!   POST /mcp        │  ┌───────────┐   ┌───────────┐   ┌──────────────────┐  │
//!   ─────────────────┼─▶│host guard │──▶│ admission │──▶│ message router   │  │
//!                    │  └───────────┘   │rate + auth│   └────────┬─────────┘  │
//!                    │                  └───────────┘            │            │
//!                    │                                  ┌────────▼─────────┐  │
//!                    │                                  │ session registry │  │
//!                    │                                  │  + Connection    │◀─┼── engine
//!   GET /mcp (SSE)   │  ┌──────────────────┐            └────────┬─────────┘  │
//!   ◀────────────────┼──│ notification     │◀────────────────────┘            │
//!                    │  │ streamer         │                                  │
//!                    │  └──────────────────┘                                  │
//!                    │  config · lifecycle · observability · net/tls          │
//!                    └────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;

use mcp_http_bridge::config::{load_config, validation::validate_config, BridgeConfig};
use mcp_http_bridge::lifecycle::{signals, Shutdown};
use mcp_http_bridge::net::load_tls_config;
use mcp_http_bridge::observability::{logging, metrics};
use mcp_http_bridge::{BasicEngine, TransportServer};

#[derive(Debug, Parser)]
#[command(name = "mcp-http-bridge", version, about = "Serve an MCP engine over HTTP and SSE")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mcp-http-bridge: {}", e);
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);
    if let Err(errors) = validate_config(&config) {
        for e in errors {
            eprintln!("mcp-http-bridge: invalid configuration: {}", e);
        }
        return ExitCode::FAILURE;
    }

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mcp-http-bridge starting");

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        session_ttl_secs = config.session.ttl_secs,
        reply_timeout_secs = config.timeouts.reply_secs,
        rate_limit = config.rate_limit.enabled,
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let tls = match &config.listener.tls {
        Some(tls) => Some(load_tls_config(tls).await?),
        None => None,
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let mut server = TransportServer::new(config, Arc::new(BasicEngine::default()));
    if let Some(tls) = tls {
        server = server.with_tls(tls);
    }
    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
