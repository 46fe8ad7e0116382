//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → loader.rs (environment overrides: secrets, flags)
//!     → SiteConfig (validated, immutable)
//!     → handed to HttpServer, which builds the per-subsystem state
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Secrets come in through config values, never read ad hoc at request time

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, ConfigError};
pub use schema::{
    CsrfConfig, EmailConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, RateBudget,
    RateLimitConfig, SecurityConfig, SiteConfig, TimeoutConfig, TlsConfig,
};
