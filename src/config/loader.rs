//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::SiteConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: SiteConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut SiteConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides read through `lookup`. Empty values are ignored.
pub fn apply_overrides_from<F>(config: &mut SiteConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(secret) = get("CSRF_SECRET") {
        config.security.csrf.secret = Some(secret);
    }
    if let Some(enabled) = get("CSRF_ENABLED") {
        config.security.csrf.enabled = enabled.trim() != "false";
    }
    if let Some(env) = get("APP_ENV") {
        config.security.csrf.production = env.trim().eq_ignore_ascii_case("production");
    }

    let gateway = &mut config.gateway;
    if let Some(env) = get("CONVERGE_ENV") {
        gateway.environment = env;
    }
    set_if_present(&mut gateway.account_id, get("CONVERGE_ACCOUNT_ID"));
    set_if_present(&mut gateway.user_id, get("CONVERGE_USER_ID"));
    set_if_present(&mut gateway.pin, get("CONVERGE_PIN"));
    set_if_present(&mut gateway.proxy_url, get("GATEWAY_PROXY_URL"));
    set_if_present(&mut gateway.proxy_api_key, get("GATEWAY_PROXY_API_KEY"));
    set_if_present(&mut gateway.proxy_bypass_token, get("GATEWAY_PROXY_BYPASS"));

    set_if_present(&mut config.email.api_key, get("RESEND_API_KEY"));
}

fn set_if_present(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}
