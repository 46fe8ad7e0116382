//! Accounting practice site.
//!
//! ```text
//!     Browser ──▶ pages (/, /about, /services, /contact, /payment...)
//!        │
//!        ├──▶ GET  /api/csrf                    issuance (rate limited)
//!        ├──▶ POST /api/payment/session         guard ──▶ payment gateway
//!        └──▶ POST /api/email/payment/approval  guard ──▶ email provider
//! ```
//!
//! Configuration comes from an optional TOML file (`--config`) with secrets and
//! flags overridden from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use cpa_site::config::{apply_env_overrides, load_config, validation::validate_config, SiteConfig};
use cpa_site::observability::{logging, metrics};
use cpa_site::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "cpa-site")]
#[command(about = "Accounting practice website and payment API", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SiteConfig::default(),
    };
    apply_env_overrides(&mut config);

    logging::init(&config.observability.log_level);
    tracing::info!("cpa-site v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(error = %error, "Invalid configuration");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    if config.security.csrf.enabled && config.security.csrf.secret.is_none() {
        tracing::warn!("CSRF_SECRET is not set; guarded routes will answer 500");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        request_timeout_secs = config.timeouts.request_secs,
        gateway_environment = %config.gateway.environment,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config);

    match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address.parse()?;
            server.run_tls(addr, &tls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
