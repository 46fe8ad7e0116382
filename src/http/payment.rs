//! `POST /api/payment/session`: obtain a hosted-payment transaction token.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::http::response::Tools;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::payments::{CreateSessionRequest, CreateSessionResponse, GatewayError};

pub async fn create_session(State(state): State<AppState>, tools: Tools, body: Bytes) -> Response {
    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return tools.bad_request(Some("Invalid JSON")),
    };

    if let Err(e) = state.gateway.ready() {
        return failure(&e);
    }

    let request = match serde_json::from_value::<CreateSessionRequest>(raw)
        .ok()
        .and_then(CreateSessionRequest::into_token_request)
    {
        Some(request) => request,
        None => return tools.bad_request(Some("Invalid body")),
    };

    let start = Instant::now();
    match state.gateway.request_token(&request).await {
        Ok(token) => {
            tracing::info!(
                invoice = %request.invoice_number,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Payment session created"
            );
            metrics::record_payment_session("created");
            tools.ok(CreateSessionResponse::created(token))
        }
        Err(e) => failure(&e),
    }
}

/// Log the full upstream detail, answer with the generic message and code.
fn failure(error: &GatewayError) -> Response {
    match error {
        GatewayError::Http { status, body } => {
            tracing::error!(status, body = %body, "Gateway rejected token request");
        }
        other => tracing::error!(error = %other, "Payment session failed"),
    }
    let code = error.code();
    metrics::record_payment_session(&code.to_string());
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(CreateSessionResponse::failed(error.public_message(), code)),
    )
        .into_response()
}
