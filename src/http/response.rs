//! Response toolkit handed to guarded handlers.
//!
//! Every helper produces a JSON body; errors use the `{error: msg}` shape so the
//! client can surface one human-readable string per failure.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

pub const DEFAULT_BAD_REQUEST: &str = "Bad Request";
pub const DEFAULT_UNAUTHORIZED: &str = "Unauthorized";
pub const DEFAULT_FORBIDDEN: &str = "Forbidden";

/// JSON error body with `status`.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Response helpers, available to any handler as an extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tools;

impl Tools {
    /// 200 with `data` as JSON.
    pub fn ok<T: Serialize>(&self, data: T) -> Response {
        (StatusCode::OK, Json(data)).into_response()
    }

    pub fn bad_request(&self, message: Option<&str>) -> Response {
        error_response(StatusCode::BAD_REQUEST, message.unwrap_or(DEFAULT_BAD_REQUEST))
    }

    pub fn unauthorized(&self, message: Option<&str>) -> Response {
        error_response(StatusCode::UNAUTHORIZED, message.unwrap_or(DEFAULT_UNAUTHORIZED))
    }

    pub fn forbidden(&self, message: Option<&str>) -> Response {
        error_response(StatusCode::FORBIDDEN, message.unwrap_or(DEFAULT_FORBIDDEN))
    }
}

impl<S> FromRequestParts<S> for Tools
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_default_messages() {
        let tools = Tools;
        let r = tools.bad_request(None);
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(r).await, json!({"error": "Bad Request"}));

        let r = tools.unauthorized(None);
        assert_eq!(r.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(r).await, json!({"error": "Unauthorized"}));

        let r = tools.forbidden(Some("Forbidden (csrf)"));
        assert_eq!(r.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(r).await, json!({"error": "Forbidden (csrf)"}));
    }

    #[tokio::test]
    async fn test_ok_serializes() {
        let r = Tools.ok(json!({"success": true}));
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(body_json(r).await, json!({"success": true}));
    }
}
