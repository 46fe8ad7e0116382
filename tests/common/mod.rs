//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use cpa_site::security::csrf::{sign, CSRF_HEADER, NONCE_COOKIE, SIGNATURE_COOKIE};
use cpa_site::SiteConfig;

pub const SECRET: &str = "topsecret";
pub const HOST: &str = "localhost:3000";
pub const ORIGIN: &str = "http://localhost:3000";

/// Serve `router` on an ephemeral loopback port.
pub async fn spawn_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// What a mock upstream received.
pub type Recorded<T> = Arc<Mutex<Vec<T>>>;

#[derive(Clone)]
struct GatewayMock {
    status: StatusCode,
    body: &'static str,
    seen: Recorded<String>,
}

/// Mock payment gateway answering every token request with `status` and `body`.
/// Records the form bodies it receives.
pub async fn mock_gateway(status: StatusCode, body: &'static str) -> (String, Recorded<String>) {
    async fn token(State(mock): State<GatewayMock>, form: Bytes) -> Response {
        mock.seen
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(&form).into_owned());
        (mock.status, mock.body).into_response()
    }

    let seen: Recorded<String> = Arc::default();
    let router = Router::new()
        .route("/hosted-payments/transaction_token", post(token))
        .with_state(GatewayMock {
            status,
            body,
            seen: seen.clone(),
        });
    let addr = spawn_router(router).await;
    (format!("http://{}/", addr), seen)
}

/// Mock transactional email API. Records the JSON messages it receives.
pub async fn mock_email(status: StatusCode) -> (String, Recorded<Value>) {
    async fn emails(State((status, seen)): State<(StatusCode, Recorded<Value>)>, Json(message): Json<Value>) -> Response {
        seen.lock().unwrap().push(message);
        if status.is_success() {
            (status, Json(json!({ "id": "email_123" }))).into_response()
        } else {
            (status, Json(json!({ "message": "provider detail" }))).into_response()
        }
    }

    let seen: Recorded<Value> = Arc::default();
    let router = Router::new()
        .route("/emails", post(emails))
        .with_state((status, seen.clone()));
    let addr = spawn_router(router).await;
    (format!("http://{}", addr), seen)
}

/// Defaults plus a CSRF secret and working gateway/email endpoints.
pub fn site_config(gateway_base: &str, email_base: &str) -> SiteConfig {
    let mut config = SiteConfig::default();
    config.security.csrf.secret = Some(SECRET.into());
    config.gateway.base_url = Some(gateway_base.into());
    config.gateway.account_id = Some("0022222".into());
    config.gateway.user_id = Some("apiuser".into());
    config.gateway.pin = Some("PIN123".into());
    config.email.api_key = Some("re_test".into());
    config.email.api_base = email_base.into();
    config.email.from = "site@example.com".into();
    config.email.to = "office@example.com".into();
    config
}

/// A same-origin POST carrying a valid cookie pair for `nonce` and `x-csrf: header_nonce`.
pub fn guarded_post(path: &str, nonce: &str, header_nonce: &str, body: Value) -> Request<Body> {
    Request::post(path)
        .header(header::HOST, HOST)
        .header(header::ORIGIN, ORIGIN)
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            header::COOKIE,
            format!(
                "{}={}; {}={}",
                NONCE_COOKIE,
                nonce,
                SIGNATURE_COOKIE,
                sign(nonce, SECRET)
            ),
        )
        .header(CSRF_HEADER, header_nonce)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
