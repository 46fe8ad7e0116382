//! Request guard for API routes.
//!
//! Checks run in a fixed order and the first failure answers the request:
//!
//! 1. rate limit (429 + `Retry-After`)
//! 2. session cookie, when configured (401)
//! 3. same origin for non-GET methods (403)
//! 4. CSRF double-submit for non-GET methods (403; 500 when unconfigured)
//!
//! The wrapped handler only runs once every check has passed.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;

use crate::config::RateBudget;
use crate::http::response::{error_response, Tools};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::headers::client_key;
use crate::security::origin;

/// Which budget a route is limited by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitSetting {
    /// The configured default budget (20 requests / 60 s unless overridden).
    #[default]
    Default,
    Budget(RateBudget),
    Disabled,
}

/// Predicate applied to a session cookie value.
pub type CookiePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Require a named cookie, optionally matching a predicate.
#[derive(Clone)]
pub struct SessionCookieRule {
    pub name: String,
    pub must_match: Option<CookiePredicate>,
}

impl SessionCookieRule {
    pub fn present(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            must_match: None,
        }
    }

    pub fn matching<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            must_match: Some(Arc::new(predicate)),
        }
    }

    fn accepts(&self, value: Option<&str>) -> bool {
        match value {
            Some(v) if !v.is_empty() => self.must_match.as_ref().map_or(true, |p| p(v)),
            _ => false,
        }
    }
}

impl fmt::Debug for SessionCookieRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookieRule")
            .field("name", &self.name)
            .field("has_predicate", &self.must_match.is_some())
            .finish()
    }
}

/// Per-route guard settings.
#[derive(Debug, Clone)]
pub struct GuardOptions {
    /// Enforce same-origin for non-GET methods.
    pub same_origin: bool,
    /// Verify CSRF for non-GET methods. Ignored when CSRF is globally disabled.
    pub csrf: bool,
    /// Let GET requests through without an Origin check.
    pub allow_get_without_origin: bool,
    pub rate_limit: RateLimitSetting,
    pub session_cookie: Option<SessionCookieRule>,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            same_origin: true,
            csrf: true,
            allow_get_without_origin: true,
            rate_limit: RateLimitSetting::Default,
            session_cookie: None,
        }
    }
}

impl GuardOptions {
    /// Only the rate limit, with `budget`. Used by the token issuance route.
    pub fn rate_limited_only(budget: RateBudget) -> Self {
        Self {
            same_origin: false,
            csrf: false,
            rate_limit: RateLimitSetting::Budget(budget),
            ..Self::default()
        }
    }

    fn same_origin_required(&self, method: &Method) -> bool {
        if !self.same_origin {
            return false;
        }
        if method == Method::GET {
            return !self.allow_get_without_origin;
        }
        true
    }
}

/// State for one guarded route.
#[derive(Clone)]
pub struct Guard {
    state: AppState,
    options: Arc<GuardOptions>,
}

impl Guard {
    pub fn new(state: AppState, options: GuardOptions) -> Self {
        Self {
            state,
            options: Arc::new(options),
        }
    }

    fn budget(&self) -> Option<RateBudget> {
        if !self.state.config.rate_limit.enabled {
            return None;
        }
        match self.options.rate_limit {
            RateLimitSetting::Default => Some(self.state.config.rate_limit.default_budget),
            RateLimitSetting::Budget(budget) => Some(budget),
            RateLimitSetting::Disabled => None,
        }
    }

    /// Run every check. `Err` carries the rejection response.
    pub fn check(&self, request: &Request<Body>) -> Result<(), Response> {
        let tools = Tools;
        let method = request.method();
        let route = request.uri().path();
        let headers = request.headers();

        if let Some(budget) = self.budget() {
            let peer = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            let client = client_key(
                headers,
                peer,
                self.state.config.rate_limit.trust_forwarded_headers,
            );
            let decision = self
                .state
                .limiter
                .check(&format!("{}:{}", client, route), budget);
            if !decision.allowed {
                tracing::warn!(
                    client = %client,
                    route = %route,
                    retry_after = decision.retry_after_secs,
                    "Rate limit exceeded"
                );
                metrics::record_rate_limited(route);
                return Err(too_many_requests(decision.retry_after_secs));
            }
        }

        if let Some(rule) = &self.options.session_cookie {
            let jar = CookieJar::from_headers(headers);
            if !rule.accepts(jar.get(&rule.name).map(|c| c.value())) {
                tracing::warn!(route = %route, cookie = %rule.name, "Session cookie rejected");
                metrics::record_rejection("session");
                return Err(tools.unauthorized(None));
            }
        }

        let authority = request.uri().authority().map(|a| a.as_str());
        if self.options.same_origin_required(method) && !origin::check_headers(headers, authority) {
            tracing::warn!(
                route = %route,
                origin = ?headers.get(header::ORIGIN),
                host = ?headers.get(header::HOST),
                "Same-origin check failed"
            );
            metrics::record_rejection("origin");
            return Err(tools.forbidden(Some("Forbidden (origin)")));
        }

        let needs_csrf = self.state.csrf.enabled() && self.options.csrf && method != Method::GET;
        if needs_csrf {
            match self.state.csrf.verify(headers) {
                Ok(Ok(())) => {}
                Ok(Err(rejection)) => {
                    tracing::warn!(route = %route, reason = rejection.as_str(), "CSRF check failed");
                    metrics::record_rejection("csrf");
                    return Err(tools.forbidden(Some("Forbidden (csrf)")));
                }
                Err(e) => {
                    tracing::error!(route = %route, error = %e, "CSRF verification unavailable");
                    metrics::record_rejection("config");
                    return Err(error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Server misconfiguration",
                    ));
                }
            }
        }

        Ok(())
    }
}

fn too_many_requests(retry_after_secs: u64) -> Response {
    let mut response = error_response(StatusCode::TOO_MANY_REQUESTS, "Too many requests");
    response.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from_str(&retry_after_secs.to_string())
            .unwrap_or(HeaderValue::from_static("60")),
    );
    response
}

/// Middleware entry point; wire with `axum::middleware::from_fn_with_state`.
pub async fn guard(State(guard): State<Guard>, request: Request<Body>, next: Next) -> Response {
    match guard.check(&request) {
        Ok(()) => next.run(request).await,
        Err(rejection) => rejection,
    }
}
