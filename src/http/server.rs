//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared [`AppState`] from configuration
//! - Create the Axum router: pages, the token route, guarded API routes
//! - Wire up middleware (request ID, tracing, timeout, body limit, security headers)
//! - Serve over plain TCP or TLS with graceful shutdown

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{SiteConfig, TlsConfig};
use crate::email::{EmailSender, ResendEmailSender};
use crate::http::middleware::{guard, Guard, GuardOptions};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::{csrf, notify, pages, payment};
use crate::payments::{ConvergeGateway, PaymentGateway};
use crate::security::csrf::CsrfService;
use crate::security::headers::with_security_headers;
use crate::security::rate_limit::RateLimiter;

const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS certificate not found: {0}")]
    MissingCertificate(String),
}

/// Application state injected into handlers and guards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SiteConfig>,
    pub limiter: Arc<RateLimiter>,
    pub csrf: Arc<CsrfService>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub email: Arc<dyn EmailSender>,
}

impl AppState {
    /// State backed by the real payment gateway and email API.
    pub fn from_config(config: SiteConfig) -> Self {
        let gateway = Arc::new(ConvergeGateway::new(config.gateway.clone()));
        let email = Arc::new(ResendEmailSender::new(&config.email));
        Self::with_collaborators(config, gateway, email)
    }

    pub fn with_collaborators(
        config: SiteConfig,
        gateway: Arc<dyn PaymentGateway>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        let limiter = RateLimiter::new(Duration::from_secs(config.rate_limit.cleanup_interval_secs));
        let csrf = CsrfService::from_config(&config.security.csrf);
        Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
            csrf: Arc::new(csrf),
            gateway,
            email,
        }
    }
}

/// HTTP server for the site.
pub struct HttpServer {
    router: Router,
    config: Arc<SiteConfig>,
}

impl HttpServer {
    pub fn new(config: SiteConfig) -> Self {
        Self::with_state(AppState::from_config(config))
    }

    pub fn with_state(state: AppState) -> Self {
        let config = state.config.clone();
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &SiteConfig, state: AppState) -> Router {
        let guarded = |options: GuardOptions| from_fn_with_state(Guard::new(state.clone(), options), guard);
        let issuance = GuardOptions::rate_limited_only(config.rate_limit.issuance_budget);

        let api = Router::new()
            .route("/api/csrf", get(csrf::issue_token).route_layer(guarded(issuance)))
            .route(
                "/api/payment/session",
                post(payment::create_session).route_layer(guarded(GuardOptions::default())),
            )
            .route(
                "/api/email/payment/approval",
                post(notify::send_approval).route_layer(guarded(GuardOptions::default())),
            )
            .route("/health", get(health));

        let mut router = api.merge(pages::router()).with_state(state);

        if config.security.enable_headers {
            router = with_security_headers(router);
        }

        router
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        tracing::info!(address = %listener.local_addr()?, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
        let handle = axum_server::Handle::new();

        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining connections");
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, ServerError> {
    for path in [cert_path, key_path] {
        if !path.exists() {
            return Err(ServerError::MissingCertificate(path.display().to_string()));
        }
    }
    Ok(RustlsConfig::from_pem_file(cert_path, key_path).await?)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
