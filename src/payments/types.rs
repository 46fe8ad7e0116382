//! Payment-session wire types.

use serde::{Deserialize, Serialize, Serializer};

/// Parameters for one gateway transaction token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// Amount in whole currency units.
    pub amount: u64,
    pub invoice_number: String,
}

/// Body of `POST /api/payment/session`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub amount: serde_json::Number,
    pub invoice_number: String,
}

impl CreateSessionRequest {
    /// Validate into a gateway request. `amount` must be a positive integer.
    pub fn into_token_request(self) -> Option<TokenRequest> {
        let amount = self.amount.as_u64().filter(|a| *a > 0)?;
        Some(TokenRequest {
            amount,
            invoice_number: self.invoice_number,
        })
    }
}

/// Closed set of machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorCode {
    MissingSecrets,
    ConfigError,
    Http(u16),
    EmptyToken,
    InvalidToken,
    NetworkError,
}

impl std::fmt::Display for SessionErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionErrorCode::MissingSecrets => f.write_str("MISSING_SECRETS"),
            SessionErrorCode::ConfigError => f.write_str("CONFIG_ERROR"),
            SessionErrorCode::Http(status) => write!(f, "HTTP_{}", status),
            SessionErrorCode::EmptyToken => f.write_str("EMPTY_TOKEN"),
            SessionErrorCode::InvalidToken => f.write_str("INVALID_TOKEN"),
            SessionErrorCode::NetworkError => f.write_str("NETWORK_ERROR"),
        }
    }
}

impl Serialize for SessionErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Response of `POST /api/payment/session`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CreateSessionResponse {
    Created {
        success: bool,
        token: String,
    },
    Failed {
        success: bool,
        error: String,
        #[serde(rename = "errorCode")]
        error_code: SessionErrorCode,
    },
}

impl CreateSessionResponse {
    pub fn created(token: String) -> Self {
        Self::Created {
            success: true,
            token,
        }
    }

    pub fn failed(error: impl Into<String>, error_code: SessionErrorCode) -> Self {
        Self::Failed {
            success: false,
            error: error.into(),
            error_code,
        }
    }
}
