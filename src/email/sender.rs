//! Transactional email API client.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email provider API key is not configured")]
    Unconfigured,
    #[error("email provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("email request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email provider response had no id")]
    MalformedResponse,
}

/// A rendered message ready to send.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

pub trait EmailSender: Send + Sync {
    /// Send `message`, returning the provider's message id.
    fn send(&self, message: EmailMessage) -> BoxFuture<'_, Result<String, EmailError>>;
}

#[derive(Deserialize)]
struct SendResponse {
    id: Option<String>,
}

/// Resend HTTP API sender.
pub struct ResendEmailSender {
    api_key: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl ResendEmailSender {
    pub fn new(config: &EmailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            endpoint: format!("{}/emails", config.api_base.trim_end_matches('/')),
            client,
        }
    }

    async fn deliver(&self, message: EmailMessage) -> Result<String, EmailError> {
        let api_key = self.api_key.as_deref().ok_or(EmailError::Unconfigured)?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Http {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: SendResponse = response.json().await?;
        parsed.id.ok_or(EmailError::MalformedResponse)
    }
}

impl EmailSender for ResendEmailSender {
    fn send(&self, message: EmailMessage) -> BoxFuture<'_, Result<String, EmailError>> {
        Box::pin(self.deliver(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_sender_fails_without_network() {
        let sender = ResendEmailSender::new(&EmailConfig::default());
        let err = sender
            .send(EmailMessage {
                from: "a@b.c".into(),
                to: vec!["d@e.f".into()],
                subject: "s".into(),
                html: "<p>x</p>".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EmailError::Unconfigured));
    }

    #[test]
    fn test_endpoint_joins_base() {
        let config = EmailConfig {
            api_base: "http://127.0.0.1:9/".into(),
            ..EmailConfig::default()
        };
        assert_eq!(ResendEmailSender::new(&config).endpoint, "http://127.0.0.1:9/emails");
    }
}
