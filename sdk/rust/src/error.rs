use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    InvalidAmount(&'static str),

    /// The CSRF token could not be obtained; submitting is not possible yet.
    #[error("security token unavailable")]
    TokenUnavailable,

    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },

    /// The payment session call completed but produced no token.
    #[error("{message}")]
    Session {
        message: String,
        code: Option<String>,
    },
}
