//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (budgets > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SiteConfig → Result<(), Vec<ValidationError>>
//! - A missing CSRF secret is not an error here; the site fails closed at runtime

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{RateBudget, SiteConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),
    #[error("{0}: limit and window_secs must both be at least 1")]
    Budget(&'static str),
    #[error("tls requires both cert_path and key_path")]
    TlsPaths,
    #[error("gateway environment must be 'prod' or 'demo', got '{0}'")]
    GatewayEnvironment(String),
    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

pub fn validate_config(config: &SiteConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() || tls.key_path.trim().is_empty() {
            errors.push(ValidationError::TlsPaths);
        }
    }

    check_budget(&mut errors, "rate_limit.default_budget", config.rate_limit.default_budget);
    check_budget(&mut errors, "rate_limit.issuance_budget", config.rate_limit.issuance_budget);

    if !matches!(config.gateway.environment.as_str(), "prod" | "demo") {
        errors.push(ValidationError::GatewayEnvironment(
            config.gateway.environment.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_budget(errors: &mut Vec<ValidationError>, name: &'static str, budget: RateBudget) {
    if budget.limit == 0 || budget.window_secs == 0 {
        errors.push(ValidationError::Budget(name));
    }
}
