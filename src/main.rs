//! Lab reading gateway server
//!
//! Serves readings from the scale, the refractometer and the polarimeter over HTTP.
//!
//! ## Environment Variables
//! - `LAB_GATEWAY_CONFIG`: configuration file (default: config/gateway.toml)
//! - `LAB_GATEWAY_SERVER__HOST`, `LAB_GATEWAY_SERVER__PORT`: listener overrides
//! - `RUST_LOG`: log filter, overrides `logging.level`

use anyhow::Context;
use clap::Parser;
use lab_gateway::{
    acquisition::AcquisitionService,
    config::{GatewayConfig, DEFAULT_CONFIG_PATH},
    gateway, logging,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lab-gateway")]
#[command(version)]
#[command(about = "HTTP gateway for the lab scale, refractometer and polarimeter")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "LAB_GATEWAY_CONFIG")]
    config: PathBuf,

    /// Host to bind to (overrides the configuration)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on (overrides the configuration)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = GatewayConfig::load_from(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    logging::init_from_config(&config.logging);

    let service = Arc::new(AcquisitionService::from_config(&config));
    let app = gateway::router(service.clone(), &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    log_banner(&config);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shutting down");
    service.shutdown().await;
    Ok(())
}

fn log_banner(config: &GatewayConfig) {
    let port = config.server.port;
    tracing::info!("Lab reading gateway listening on http://{}:{}", config.server.host, port);
    tracing::info!("Endpoints:");
    for (name, url) in gateway::endpoint_urls(port) {
        tracing::info!("  GET {:<16} {}", name, url);
    }
    tracing::info!("  GET {:<16} http://localhost:{}/status", "status", port);
    tracing::info!("Instruments:");
    tracing::info!(
        "  Scale:         {} ({} baud)",
        config.scale.path,
        config.scale.baud_rate
    );
    tracing::info!(
        "  Refractometer: {}:{}",
        config.refractometer.host,
        config.refractometer.port
    );
    tracing::info!(
        "  Polarimeter:   {}:{}",
        config.polarimeter.host,
        config.polarimeter.port
    );
    tracing::info!("  Audit files:   {}", config.audit.directory.display());
    tracing::info!("Ready for requests");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
