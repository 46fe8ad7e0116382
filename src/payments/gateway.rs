//! Hosted payment gateway client.
//!
//! The gateway issues a short-lived transaction token that the browser hands to the
//! hosted lightbox. Card data never reaches this server.

use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use thiserror::Error;
use url::Url;

use crate::config::GatewayConfig;
use crate::payments::types::{SessionErrorCode, TokenRequest};

const PROD_BASE_URL: &str = "https://api.convergepay.com/";
const DEMO_BASE_URL: &str = "https://demo.convergepay.com/";
const TOKEN_PATH: &str = "hosted-payments/transaction_token";

/// Tokens shorter than this are rejected as implausible.
const MIN_TOKEN_LEN: usize = 10;

/// Upstream bodies are truncated to this many characters in logs.
const LOG_BODY_LIMIT: usize = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("missing gateway secrets: {}", .0.join(", "))]
    MissingSecrets(Vec<&'static str>),
    #[error("gateway configuration error: {0}")]
    Config(String),
    #[error("gateway returned HTTP {status}")]
    Http { status: u16, body: String },
    #[error("gateway returned an empty token")]
    EmptyToken,
    #[error("gateway returned an invalid token")]
    InvalidToken,
    #[error("gateway request failed: {0}")]
    Network(String),
}

impl GatewayError {
    pub fn code(&self) -> SessionErrorCode {
        match self {
            GatewayError::MissingSecrets(_) => SessionErrorCode::MissingSecrets,
            GatewayError::Config(_) => SessionErrorCode::ConfigError,
            GatewayError::Http { status, .. } => SessionErrorCode::Http(*status),
            GatewayError::EmptyToken => SessionErrorCode::EmptyToken,
            GatewayError::InvalidToken => SessionErrorCode::InvalidToken,
            GatewayError::Network(_) => SessionErrorCode::NetworkError,
        }
    }

    /// Message safe to show a customer.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::MissingSecrets(_) | GatewayError::Config(_) => {
                "Payment system configuration error"
            }
            GatewayError::Http { .. } | GatewayError::Network(_) => {
                "Payment system temporarily unavailable. Please try again."
            }
            GatewayError::EmptyToken | GatewayError::InvalidToken => {
                "Payment system error. Please try again."
            }
        }
    }
}

/// A source of hosted-payment transaction tokens.
pub trait PaymentGateway: Send + Sync {
    /// Fails when the gateway cannot be called at all with the current configuration.
    fn ready(&self) -> Result<(), GatewayError>;

    fn request_token<'a>(&'a self, request: &'a TokenRequest) -> BoxFuture<'a, Result<String, GatewayError>>;
}

/// Check a raw token body and return the trimmed token.
pub fn validate_token(raw: &str) -> Result<String, GatewayError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(GatewayError::EmptyToken);
    }
    if token.chars().count() < MIN_TOKEN_LEN || token.contains("error") || token.contains("Error") {
        return Err(GatewayError::InvalidToken);
    }
    Ok(token.to_string())
}

struct Credentials<'a> {
    account_id: &'a str,
    user_id: &'a str,
    pin: &'a str,
}

/// Converge hosted-payments client.
pub struct ConvergeGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl ConvergeGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default gateway HTTP client");
                reqwest::Client::new()
            });
        Self { config, client }
    }

    fn credentials(&self) -> Result<Credentials<'_>, GatewayError> {
        let mut missing = Vec::new();
        let account_id = present(&self.config.account_id);
        let user_id = present(&self.config.user_id);
        let pin = present(&self.config.pin);
        if account_id.is_none() {
            missing.push("CONVERGE_ACCOUNT_ID");
        }
        if user_id.is_none() {
            missing.push("CONVERGE_USER_ID");
        }
        if pin.is_none() {
            missing.push("CONVERGE_PIN");
        }
        if present(&self.config.proxy_url).is_some() {
            if present(&self.config.proxy_api_key).is_none() {
                missing.push("GATEWAY_PROXY_API_KEY");
            }
            if present(&self.config.proxy_bypass_token).is_none() {
                missing.push("GATEWAY_PROXY_BYPASS");
            }
        }

        match (account_id, user_id, pin) {
            (Some(account_id), Some(user_id), Some(pin)) if missing.is_empty() => Ok(Credentials {
                account_id,
                user_id,
                pin,
            }),
            _ => Err(GatewayError::MissingSecrets(missing)),
        }
    }

    /// The token endpoint for the configured environment.
    pub fn token_endpoint(&self) -> Result<Url, GatewayError> {
        let base = match &self.config.base_url {
            Some(base) => base.clone(),
            None => match self.config.environment.as_str() {
                "prod" => PROD_BASE_URL.to_string(),
                "demo" => DEMO_BASE_URL.to_string(),
                other => {
                    return Err(GatewayError::Config(format!(
                        "unknown gateway environment '{}'",
                        other
                    )))
                }
            },
        };
        let base = if base.ends_with('/') { base } else { format!("{}/", base) };
        Url::parse(&base)
            .and_then(|b| b.join(TOKEN_PATH))
            .map_err(|e| GatewayError::Config(format!("invalid gateway base URL: {}", e)))
    }

    /// Where the request is actually sent: the endpoint, or the proxy carrying it.
    fn request_url(&self) -> Result<Url, GatewayError> {
        let endpoint = self.token_endpoint()?;
        match present(&self.config.proxy_url) {
            Some(proxy) => {
                let mut url = Url::parse(proxy)
                    .map_err(|e| GatewayError::Config(format!("invalid proxy URL: {}", e)))?;
                url.query_pairs_mut().append_pair("url", endpoint.as_str());
                Ok(url)
            }
            None => Ok(endpoint),
        }
    }

    fn form_body(credentials: &Credentials<'_>, request: &TokenRequest) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("ssl_account_id", credentials.account_id)
            .append_pair("ssl_user_id", credentials.user_id)
            .append_pair("ssl_pin", credentials.pin)
            .append_pair("ssl_transaction_type", "ccsale");
        if request.amount > 0 {
            form.append_pair("ssl_amount", &request.amount.to_string());
        }
        if !request.invoice_number.is_empty() {
            form.append_pair("ssl_invoice_number", &request.invoice_number);
        }
        form.finish()
    }

    async fn fetch_token(&self, request: &TokenRequest) -> Result<String, GatewayError> {
        let credentials = self.credentials()?;
        let url = self.request_url()?;
        let start = Instant::now();

        tracing::info!(
            amount = request.amount,
            invoice = %request.invoice_number,
            via_proxy = self.config.proxy_url.is_some(),
            "Requesting gateway transaction token"
        );

        let mut builder = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Self::form_body(&credentials, request));
        if let Some(key) = &self.config.proxy_api_key {
            builder = builder.header("X-API-Key", key);
        }
        if let Some(bypass) = &self.config.proxy_bypass_token {
            builder = builder.header("x-vercel-protection-bypass", bypass);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let status = response.status();
        tracing::info!(status = %status, elapsed_ms = start.elapsed().as_millis() as u64, "Gateway responded");

        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body: truncate(&body, LOG_BODY_LIMIT),
            });
        }

        let token = validate_token(&body)?;
        tracing::info!(token_len = token.len(), "Gateway token received");
        Ok(token)
    }
}

impl PaymentGateway for ConvergeGateway {
    fn ready(&self) -> Result<(), GatewayError> {
        self.credentials()?;
        self.request_url()?;
        Ok(())
    }

    fn request_token<'a>(&'a self, request: &'a TokenRequest) -> BoxFuture<'a, Result<String, GatewayError>> {
        Box::pin(self.fetch_token(request))
    }
}

/// A configured, non-blank value.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
