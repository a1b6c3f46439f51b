//! Marketplace API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ request id → trace → security headers → CORS → deadline → rate limit
//!                        ┬─▶ /health, /         (status)
//!                        ├─▶ /internal/*       (OTP, scans; key-guarded)
//!                        └─▶ anything else     (routing → upstream)
//!
//!     Upstreams: auth, user, job, messaging, payment, review
//!
//!     Background: maintenance sweeper (rate budgets, passcodes, settled scans)
//!                 scan completion worker (webhook → pending scan → clean | infected)
//! ```
//!
//! # Startup Order
//! 1. Load configuration (file, then environment overrides, then validation)
//! 2. Logging
//! 3. Bootstrap check of required environment variables (fatal on miss)
//! 4. Metrics exporter
//! 5. Listener, signal handling, serve until shutdown

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use marketplace_gateway::config::{load_with_env, ProcessEnv};
use marketplace_gateway::lifecycle::{signals, BootstrapGuard, BootstrapOutcome, ProcessExit};
use marketplace_gateway::observability::{logging, metrics};
use marketplace_gateway::{GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "marketplace-gateway")]
#[command(about = "API gateway for the marketplace backend services", long_about = None)]
struct Args {
    /// TOML configuration file. Built-in marketplace defaults when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let env = ProcessEnv;

    let config = load_with_env(args.config.as_deref(), &env)?;
    logging::init_logging(config.environment, &config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = config.environment.as_str(),
        "marketplace-gateway starting"
    );

    let guard = BootstrapGuard::new(&env, &ProcessExit);
    if let BootstrapOutcome::Halted(failure) =
        guard.validate(&config.bootstrap.required_env[..], &config.bootstrap.service_name)
    {
        return Err(failure.into());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstreams = config.upstreams.len(),
        rate_limit_enabled = config.rate_limit.enabled,
        request_timeout_secs = config.timeouts.request_secs,
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
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let signal = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { signals::trigger_on_signal(&shutdown).await }
    });

    GatewayServer::new(config).run(listener, signal).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
