//! In-process tests of the full router: guard, issuance, payment sessions, email.

use axum::body::Body;
use axum::http::{header, Request, StatusCode, Version};
use serde_json::json;
use tower::ServiceExt;

use cpa_site::security::csrf::{sign, NONCE_COOKIE, SIGNATURE_COOKIE};
use cpa_site::{HttpServer, SiteConfig};

mod common;
use common::{
    body_json, body_text, guarded_post, mock_email, mock_gateway, site_config, HOST, ORIGIN, SECRET,
};

const TOKEN: &str = "ABCDEFGHIJ0123456789";

fn cookie_value(set_cookie: &str) -> (&str, &str) {
    let pair = set_cookie.split(';').next().unwrap();
    pair.split_once('=').unwrap()
}

#[tokio::test]
async fn test_issuance_sets_signed_cookie_pair() {
    let app = HttpServer::new(site_config("http://unused/", "http://unused")).router();
    let res = app
        .oneshot(Request::get("/api/csrf").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CACHE_CONTROL], "no-store");

    let cookies: Vec<String> = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 2);
    for cookie in &cookies {
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(!cookie.contains("Secure"));
    }

    let (_, nonce) = cookies
        .iter()
        .map(|c| cookie_value(c))
        .find(|(name, _)| *name == NONCE_COOKIE)
        .unwrap();
    let (_, signature) = cookies
        .iter()
        .map(|c| cookie_value(c))
        .find(|(name, _)| *name == SIGNATURE_COOKIE)
        .unwrap();
    assert_eq!(nonce.len(), 32);
    assert_eq!(signature, sign(nonce, SECRET));

    let nonce = nonce.to_string();
    assert_eq!(body_json(res).await, json!({ "nonce": nonce }));
}

#[tokio::test]
async fn test_issuance_fails_closed_without_secret() {
    let app = HttpServer::new(SiteConfig::default()).router();
    let res = app
        .oneshot(Request::get("/api/csrf").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_payment_session_success() {
    let (gateway, seen) = mock_gateway(StatusCode::OK, TOKEN).await;
    let app = HttpServer::new(site_config(&gateway, "http://unused")).router();

    let res = app
        .oneshot(guarded_post(
            "/api/payment/session",
            "abc123",
            "abc123",
            json!({ "amount": 100, "invoiceNumber": "INV-1" }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({ "success": true, "token": TOKEN }));

    let forms = seen.lock().unwrap();
    assert_eq!(forms.len(), 1);
    assert!(forms[0].contains("ssl_transaction_type=ccsale"));
    assert!(forms[0].contains("ssl_amount=100"));
    assert!(forms[0].contains("ssl_invoice_number=INV-1"));
    assert!(forms[0].contains("ssl_pin=PIN123"));
}

#[tokio::test]
async fn test_payment_session_empty_token() {
    let (gateway, _) = mock_gateway(StatusCode::OK, "   ").await;
    let app = HttpServer::new(site_config(&gateway, "http://unused")).router();

    let res = app
        .oneshot(guarded_post(
            "/api/payment/session",
            "abc123",
            "abc123",
            json!({ "amount": 100, "invoiceNumber": "INV-1" }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errorCode"], "EMPTY_TOKEN");
}

#[tokio::test]
async fn test_payment_session_upstream_status_is_not_leaked() {
    let (gateway, _) = mock_gateway(StatusCode::BAD_GATEWAY, "upstream stack trace").await;
    let app = HttpServer::new(site_config(&gateway, "http://unused")).router();

    let res = app
        .oneshot(guarded_post(
            "/api/payment/session",
            "abc123",
            "abc123",
            json!({ "amount": 5, "invoiceNumber": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = body_text(res).await;
    assert!(text.contains("HTTP_502"));
    assert!(!text.contains("stack trace"));
}

#[tokio::test]
async fn test_payment_session_missing_credentials() {
    let (gateway, seen) = mock_gateway(StatusCode::OK, TOKEN).await;
    let mut config = site_config(&gateway, "http://unused");
    config.gateway.pin = None;
    let app = HttpServer::new(config).router();

    let res = app
        .oneshot(guarded_post(
            "/api/payment/session",
            "abc123",
            "abc123",
            json!({ "amount": 100, "invoiceNumber": "INV-1" }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(res).await["errorCode"], "MISSING_SECRETS");
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_session_rejects_bad_input() {
    let (gateway, seen) = mock_gateway(StatusCode::OK, TOKEN).await;
    let app = HttpServer::new(site_config(&gateway, "http://unused")).router();

    let mut req = guarded_post("/api/payment/session", "abc123", "abc123", json!({}));
    *req.body_mut() = Body::from("{not json");
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await, json!({ "error": "Invalid JSON" }));

    for body in [
        json!({ "amount": -5, "invoiceNumber": "INV-1" }),
        json!({ "amount": 12.5, "invoiceNumber": "INV-1" }),
        json!({ "amount": 100 }),
        json!({ "amount": "100", "invoiceNumber": "INV-1" }),
    ] {
        let res = app
            .clone()
            .oneshot(guarded_post("/api/payment/session", "abc123", "abc123", body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await, json!({ "error": "Invalid body" }));
    }
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_csrf_header_is_forbidden() {
    let (gateway, seen) = mock_gateway(StatusCode::OK, TOKEN).await;
    let app = HttpServer::new(site_config(&gateway, "http://unused")).router();

    let res = app
        .oneshot(guarded_post(
            "/api/payment/session",
            "abc123",
            "zzz999",
            json!({ "amount": 100, "invoiceNumber": "INV-1" }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(res).await, json!({ "error": "Forbidden (csrf)" }));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cross_origin_post_is_forbidden() {
    let app = HttpServer::new(site_config("http://unused/", "http://unused")).router();
    let mut req = guarded_post("/api/payment/session", "abc123", "abc123", json!({}));
    req.headers_mut()
        .insert(header::ORIGIN, "https://attacker.example".parse().unwrap());

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(res).await, json!({ "error": "Forbidden (origin)" }));
}

#[tokio::test]
async fn test_http2_request_without_host_uses_authority() {
    let (gateway, seen) = mock_gateway(StatusCode::OK, TOKEN).await;
    let app = HttpServer::new(site_config(&gateway, "http://unused")).router();

    // HTTP/2 carries the host as `:authority`, which lands in the URI.
    let mut req = guarded_post(
        "/api/payment/session",
        "abc123",
        "abc123",
        json!({ "amount": 100, "invoiceNumber": "INV-1" }),
    );
    req.headers_mut().remove(header::HOST);
    *req.uri_mut() = format!("http://{}/api/payment/session", HOST).parse().unwrap();
    *req.version_mut() = Version::HTTP_2;

    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(seen.lock().unwrap().len(), 1);

    let mut req = guarded_post("/api/payment/session", "abc123", "abc123", json!({}));
    req.headers_mut().remove(header::HOST);
    *req.uri_mut() = "http://other.example/api/payment/session".parse().unwrap();
    *req.version_mut() = Version::HTTP_2;

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(res).await, json!({ "error": "Forbidden (origin)" }));
}

#[tokio::test]
async fn test_csrf_disabled_skips_token_check() {
    let (gateway, seen) = mock_gateway(StatusCode::OK, TOKEN).await;
    let mut config = site_config(&gateway, "http://unused");
    config.security.csrf.enabled = false;
    let app = HttpServer::new(config).router();

    let req = Request::post("/api/payment/session")
        .header(header::HOST, HOST)
        .header(header::ORIGIN, ORIGIN)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "amount": 100, "invoiceNumber": "INV-1" }).to_string(),
        ))
        .unwrap();

    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({ "success": true, "token": TOKEN }));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_issuance_has_its_own_budget() {
    let app = HttpServer::new(site_config("http://unused/", "http://unused")).router();
    let issue = || {
        Request::get("/api/csrf")
            .header("x-forwarded-for", "203.0.113.20")
            .body(Body::empty())
            .unwrap()
    };

    // Thirty issuances fit, well past the guarded routes' twenty.
    for _ in 0..30 {
        let res = app.clone().oneshot(issue()).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app.clone().oneshot(issue()).await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().get(header::RETRY_AFTER).is_some());
    assert!(res.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_json(res).await, json!({ "error": "Too many requests" }));

    // The same client still has its payment budget.
    let mut req = guarded_post("/api/payment/session", "abc123", "abc123", json!({}));
    req.headers_mut()
        .insert("x-forwarded-for", "203.0.113.20".parse().unwrap());
    let res = app.oneshot(req).await.unwrap();
    assert_ne!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_twenty_first_request_is_rate_limited() {
    let app = HttpServer::new(site_config("http://unused/", "http://unused")).router();
    let request = |client: &str| {
        let mut req = guarded_post("/api/payment/session", "abc123", "abc123", json!({}));
        req.headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        req
    };

    for _ in 0..20 {
        let res = app.clone().oneshot(request("203.0.113.9")).await.unwrap();
        assert_ne!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let res = app.clone().oneshot(request("203.0.113.9")).await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry: u64 = res.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry));
    assert_eq!(body_json(res).await, json!({ "error": "Too many requests" }));

    // Other clients keep their own budget.
    let res = app.oneshot(request("198.51.100.4")).await.unwrap();
    assert_ne!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_approval_email_is_sent_escaped() {
    let (email, seen) = mock_email(StatusCode::OK).await;
    let app = HttpServer::new(site_config("http://unused/", &email)).router();

    let res = app
        .oneshot(guarded_post(
            "/api/email/payment/approval",
            "abc123",
            "abc123",
            json!({
                "invoiceId": "INV-7",
                "amount": 250,
                "email": "<b>client</b>@example.com",
                "responseJson": "{}"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({ "success": true, "id": "email_123" }));

    let messages = seen.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["subject"], "Payment Approval For Invoice INV-7");
    assert_eq!(messages[0]["to"], json!(["office@example.com"]));
    let html = messages[0]["html"].as_str().unwrap();
    assert!(html.contains("&lt;b&gt;client&lt;/b&gt;@example.com has approved a payment of $250"));
    assert!(!html.contains("<b>client"));
}

#[tokio::test]
async fn test_approval_email_failure_is_generic() {
    let (email, _) = mock_email(StatusCode::UNPROCESSABLE_ENTITY).await;
    let app = HttpServer::new(site_config("http://unused/", &email)).router();

    let res = app
        .oneshot(guarded_post(
            "/api/email/payment/approval",
            "abc123",
            "abc123",
            json!({ "invoiceId": "INV-7", "amount": 250, "email": "a@example.com" }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(res).await,
        json!({ "success": false, "error": "Failed to send email" })
    );
}

#[tokio::test]
async fn test_payment_pages() {
    let app = HttpServer::new(SiteConfig::default()).router();

    let res = app
        .clone()
        .oneshot(Request::get("/payment/INV-100?amount=250").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("INV-100"));
    assert!(html.contains("value=\"250\""));

    let res = app
        .oneshot(
            Request::get("/payment/complete?ssl_result_message=%3Cb%3EAPPROVAL%3C%2Fb%3E&ssl_approval_code=CMC142")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let html = body_text(res).await;
    assert!(html.contains("&lt;b&gt;APPROVAL&lt;/b&gt;"));
    assert!(html.contains("CMC142"));
}
