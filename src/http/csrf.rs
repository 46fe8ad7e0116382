//! `GET /api/csrf`: mint a nonce/signature pair.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use crate::http::response::error_response;
use crate::http::server::AppState;
use crate::observability::metrics;

#[derive(Debug, Serialize)]
pub struct TokenBody {
    pub nonce: String,
}

pub async fn issue_token(State(state): State<AppState>, jar: CookieJar) -> Response {
    match state.csrf.issue() {
        Ok(pair) => {
            metrics::record_token_issued();
            let jar = state.csrf.set_cookies(jar, &pair);
            (
                jar,
                [(header::CACHE_CONTROL, "no-store")],
                Json(TokenBody { nonce: pair.nonce }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Cannot issue CSRF token");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server misconfiguration")
        }
    }
}
