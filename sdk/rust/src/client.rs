use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::error::SdkError;
use crate::notify::ApprovalNotice;
use crate::payment::validate_amount;
use crate::token::{CsrfTokenCache, HttpTokenFetcher, RetryPolicy};

const CSRF_HEADER: &str = "x-csrf";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionBody {
    #[serde(default)]
    success: bool,
    token: Option<String>,
    error: Option<String>,
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailBody {
    #[serde(default)]
    success: bool,
    id: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest<'a> {
    amount: serde_json::Number,
    invoice_number: &'a str,
}

/// Client for the site's API. Clones share cookies and the token cache.
#[derive(Clone)]
pub struct SiteClient {
    http: Client,
    base: Url,
    origin: String,
    tokens: Arc<CsrfTokenCache>,
}

impl SiteClient {
    pub fn new(base_url: &str) -> Result<Self, SdkError> {
        Self::with_policy(base_url, RetryPolicy::default())
    }

    pub fn with_policy(base_url: &str, policy: RetryPolicy) -> Result<Self, SdkError> {
        let base = Url::parse(base_url)?;
        let http = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;
        let fetcher = HttpTokenFetcher::new(http.clone(), base.join("/api/csrf")?);
        let tokens = CsrfTokenCache::new(Arc::new(fetcher), policy);
        let origin = base.origin().ascii_serialization();
        Ok(Self {
            http,
            base,
            origin,
            tokens,
        })
    }

    /// The shared token cache behind every guarded call.
    pub fn tokens(&self) -> &Arc<CsrfTokenCache> {
        &self.tokens
    }

    /// Ask for a hosted payment token. `amount` is the raw user input.
    pub async fn create_session(
        &self,
        amount: &str,
        invoice_number: Option<&str>,
    ) -> Result<String, SdkError> {
        let amount = validate_amount(amount)?;
        let body = SessionRequest {
            amount,
            invoice_number: invoice_number.unwrap_or_default(),
        };
        let (status, value) = self.post_guarded("/api/payment/session", &body).await?;

        let parsed: SessionBody = serde_json::from_value(value).map_err(|_| SdkError::Status {
            status: status.as_u16(),
            message: "Unexpected response".to_string(),
        })?;
        match parsed {
            SessionBody {
                success: true,
                token: Some(token),
                ..
            } if !token.is_empty() => Ok(token),
            SessionBody { error, error_code, .. } => Err(SdkError::Session {
                message: error.unwrap_or_else(|| "No token returned".to_string()),
                code: error_code,
            }),
        }
    }

    /// Notify the practice of an approved payment. Returns the provider message id.
    pub async fn send_approval(&self, notice: &ApprovalNotice) -> Result<String, SdkError> {
        let (status, value) = self.post_guarded("/api/email/payment/approval", notice).await?;
        match serde_json::from_value::<EmailBody>(value) {
            Ok(EmailBody {
                success: true,
                id: Some(id),
                ..
            }) => Ok(id),
            Ok(EmailBody { error, .. }) => Err(SdkError::Status {
                status: status.as_u16(),
                message: error.unwrap_or_else(|| "Failed to send email".to_string()),
            }),
            Err(_) => Err(SdkError::Status {
                status: status.as_u16(),
                message: "Unexpected response".to_string(),
            }),
        }
    }

    async fn post_guarded<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(StatusCode, Value), SdkError> {
        let nonce = self.tokens.token().await.ok_or(SdkError::TokenUnavailable)?;
        let response = self
            .http
            .post(self.base.join(path)?)
            .header(header::ORIGIN, &self.origin)
            .header(CSRF_HEADER, nonce)
            .json(body)
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::FORBIDDEN {
            // The cookie pair may have been rotated or lost; fetch a new one next time.
            self.tokens.invalidate();
        }

        let value = response.json::<Value>().await.unwrap_or(Value::Null);
        if status.is_client_error() {
            let message = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Request rejected")
                .to_string();
            tracing::warn!(path, status = status.as_u16(), error = %message, "Request rejected");
            return Err(SdkError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok((status, value))
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<bool, SdkError> {
        let response = self.http.get(self.base.join("/health")?).send().await?;
        let value: Value = response.json().await?;
        Ok(value == json!({ "status": "ok" }))
    }
}
