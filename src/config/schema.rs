//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the site.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the site.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SiteConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request protection settings (CSRF, headers, body size).
    pub security: SecurityConfig,

    /// Rate limiting budgets.
    pub rate_limit: RateLimitConfig,

    /// Hosted payment gateway credentials.
    pub gateway: GatewayConfig,

    /// Transactional email provider.
    pub email: EmailConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// CSRF token settings.
    pub csrf: CsrfConfig,
    /// Enable security response headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            csrf: CsrfConfig::default(),
            enable_headers: true,
            max_body_size: 64 * 1024,
        }
    }
}

/// CSRF token settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// HMAC signing secret. `None` leaves issuance and verification failing closed.
    pub secret: Option<String>,

    /// Global switch; when false no route verifies CSRF tokens.
    pub enabled: bool,

    /// Production mode marks cookies `Secure`.
    pub production: bool,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            secret: None,
            enabled: true,
            production: false,
        }
    }
}

// Keeps the secret out of logs.
impl std::fmt::Debug for CsrfConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("enabled", &self.enabled)
            .field("production", &self.production)
            .finish()
    }
}

/// A request budget for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateBudget {
    /// Maximum requests admitted per window.
    pub limit: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateBudget {
    pub const fn new(limit: u32, window_secs: u64) -> Self {
        Self { limit, window_secs }
    }
}

impl Default for RateBudget {
    fn default() -> Self {
        Self::new(20, 60)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting on guarded routes.
    pub enabled: bool,

    /// Budget applied to guarded mutation routes.
    pub default_budget: RateBudget,

    /// Budget applied to the CSRF issuance route.
    pub issuance_budget: RateBudget,

    /// Derive the client key from X-Forwarded-For / X-Real-IP.
    /// When false the peer socket address is used.
    pub trust_forwarded_headers: bool,

    /// Minimum seconds between stale-bucket sweeps.
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_budget: RateBudget::new(20, 60),
            issuance_budget: RateBudget::new(30, 60),
            trust_forwarded_headers: true,
            cleanup_interval_secs: 60,
        }
    }
}

/// Hosted payment gateway configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway environment: "prod" or "demo".
    pub environment: String,

    /// Overrides the environment's API base URL (used for testing).
    pub base_url: Option<String>,

    pub account_id: Option<String>,
    pub user_id: Option<String>,
    pub pin: Option<String>,

    /// Optional forwarding proxy all gateway calls go through.
    pub proxy_url: Option<String>,
    pub proxy_api_key: Option<String>,
    pub proxy_bypass_token: Option<String>,

    /// Upstream request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: "demo".to_string(),
            base_url: None,
            account_id: None,
            user_id: None,
            pin: None,
            proxy_url: None,
            proxy_api_key: None,
            proxy_bypass_token: None,
            timeout_secs: 15,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("has_account_id", &self.account_id.is_some())
            .field("has_user_id", &self.user_id.is_some())
            .field("has_pin", &self.pin.is_some())
            .field("proxy_url", &self.proxy_url)
            .field("has_proxy_api_key", &self.proxy_api_key.is_some())
            .field("has_proxy_bypass_token", &self.proxy_bypass_token.is_some())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Transactional email configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Provider API key. `None` makes every send fail with a logged error.
    pub api_key: Option<String>,

    /// Provider API base URL.
    pub api_base: String,

    /// Sender address.
    pub from: String,

    /// Practice inbox receiving approval notices.
    pub to: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.resend.com".to_string(),
            from: "noreply@example.com".to_string(),
            to: "billing@example.com".to_string(),
        }
    }
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("has_api_key", &self.api_key.is_some())
            .field("api_base", &self.api_base)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
