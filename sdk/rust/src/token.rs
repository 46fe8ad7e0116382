//! Shared CSRF token cache.
//!
//! Any number of consumers can subscribe at once. The first access starts a single
//! fetch; everyone else waits on that same fetch. A resolved nonce is served
//! synchronously to current and future subscribers until [`CsrfTokenCache::invalidate`].
//!
//! Exhausting retries resolves to [`TokenState::Unavailable`], which is not cached:
//! the next access starts a new fetch.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tokio::sync::watch;
use url::Url;

/// Wait used when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);

/// Result of a single issuance request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttempt {
    Issued(String),
    RateLimited(Duration),
    Rejected(u16),
    /// 2xx with a body that is not `{nonce: string}`.
    Malformed,
    Transport(String),
}

/// One issuance request, no retries.
pub trait TokenFetcher: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, FetchAttempt>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

/// Run `fetcher` under `policy`. `None` means unavailable.
pub async fn fetch_with_retry(fetcher: &dyn TokenFetcher, policy: RetryPolicy) -> Option<String> {
    for attempt in 1..=policy.max_attempts {
        let wait = match fetcher.fetch().await {
            FetchAttempt::Issued(nonce) => return Some(nonce),
            FetchAttempt::Malformed => {
                tracing::error!(attempt, "CSRF token response has an invalid format");
                return None;
            }
            FetchAttempt::RateLimited(retry_after) => {
                tracing::warn!(attempt, retry_after_secs = retry_after.as_secs(), "CSRF token rate limited");
                retry_after
            }
            FetchAttempt::Rejected(status) => {
                tracing::error!(attempt, status, "CSRF token fetch failed");
                policy.backoff(attempt)
            }
            FetchAttempt::Transport(error) => {
                tracing::error!(attempt, error = %error, "CSRF token fetch error");
                policy.backoff(attempt)
            }
        };
        if attempt < policy.max_attempts {
            tokio::time::sleep(wait).await;
        }
    }
    None
}

/// Fetches from `GET /api/csrf` with a shared (cookie-holding) HTTP client.
#[derive(Debug, Clone)]
pub struct HttpTokenFetcher {
    client: Client,
    endpoint: Url,
}

#[derive(Deserialize)]
struct TokenBody {
    nonce: String,
}

impl HttpTokenFetcher {
    /// `client` must have a cookie store so the issued cookies reach later requests.
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    async fn fetch_once(&self) -> FetchAttempt {
        let response = match self
            .client
            .get(self.endpoint.clone())
            .header(header::CACHE_CONTROL, "no-store")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchAttempt::Transport(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            return FetchAttempt::RateLimited(retry_after);
        }
        if !status.is_success() {
            return FetchAttempt::Rejected(status.as_u16());
        }

        match response.json::<TokenBody>().await {
            Ok(body) if !body.nonce.is_empty() => FetchAttempt::Issued(body.nonce),
            _ => FetchAttempt::Malformed,
        }
    }
}

impl TokenFetcher for HttpTokenFetcher {
    fn fetch(&self) -> BoxFuture<'_, FetchAttempt> {
        Box::pin(self.fetch_once())
    }
}

/// What a consumer currently sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Idle,
    Pending,
    Ready(String),
    Unavailable,
}

impl TokenState {
    pub fn nonce(&self) -> Option<&str> {
        match self {
            TokenState::Ready(nonce) => Some(nonce),
            _ => None,
        }
    }

    fn is_settled(&self) -> bool {
        !matches!(self, TokenState::Pending)
    }
}

struct Inflight {
    generation: u64,
    running: bool,
}

pub struct CsrfTokenCache {
    fetcher: Arc<dyn TokenFetcher>,
    policy: RetryPolicy,
    state: watch::Sender<TokenState>,
    inflight: Mutex<Inflight>,
}

impl CsrfTokenCache {
    pub fn new(fetcher: Arc<dyn TokenFetcher>, policy: RetryPolicy) -> Arc<Self> {
        let (state, _) = watch::channel(TokenState::Idle);
        Arc::new(Self {
            fetcher,
            policy,
            state,
            inflight: Mutex::new(Inflight {
                generation: 0,
                running: false,
            }),
        })
    }

    /// Mount a consumer. Starts the shared fetch if nothing is cached or running.
    pub fn subscribe(self: &Arc<Self>) -> TokenSubscription {
        let rx = self.state.subscribe();
        self.ensure_fetch();
        TokenSubscription {
            cache: Arc::clone(self),
            rx,
        }
    }

    /// Subscribe and wait for the outcome.
    pub async fn token(self: &Arc<Self>) -> Option<String> {
        self.subscribe().wait().await
    }

    /// Snapshot without subscribing or fetching.
    pub fn state(&self) -> TokenState {
        self.state.borrow().clone()
    }

    /// Drop the cached nonce and forget any in-flight fetch; its late result is discarded.
    pub fn invalidate(&self) {
        let mut inflight = self.lock();
        inflight.generation += 1;
        inflight.running = false;
        self.state.send_replace(TokenState::Idle);
        tracing::debug!(generation = inflight.generation, "CSRF token invalidated");
    }

    /// Invalidate, then fetch a fresh nonce.
    pub async fn refresh(self: &Arc<Self>) -> Option<String> {
        self.invalidate();
        self.token().await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inflight> {
        self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_fetch(self: &Arc<Self>) {
        let mut inflight = self.lock();
        if inflight.running || matches!(*self.state.borrow(), TokenState::Ready(_)) {
            return;
        }
        inflight.running = true;
        let generation = inflight.generation;
        self.state.send_replace(TokenState::Pending);
        drop(inflight);

        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = fetch_with_retry(cache.fetcher.as_ref(), cache.policy).await;

            let mut inflight = cache.lock();
            if inflight.generation != generation {
                tracing::debug!(generation, "Discarding superseded CSRF token fetch");
                return;
            }
            inflight.running = false;
            cache.state.send_replace(match outcome {
                Some(nonce) => TokenState::Ready(nonce),
                None => TokenState::Unavailable,
            });
        });
    }
}

/// A mounted consumer. Dropping it stops listening; the shared fetch keeps running.
pub struct TokenSubscription {
    cache: Arc<CsrfTokenCache>,
    rx: watch::Receiver<TokenState>,
}

impl TokenSubscription {
    /// The nonce if already resolved. Never blocks.
    pub fn current(&self) -> Option<String> {
        self.rx.borrow().nonce().map(str::to_string)
    }

    /// Wait for the shared fetch. `None` means unavailable.
    pub async fn wait(&mut self) -> Option<String> {
        loop {
            let settled = match self.rx.wait_for(TokenState::is_settled).await {
                Ok(state) => state.clone(),
                Err(_) => return None,
            };
            match settled {
                TokenState::Ready(nonce) => return Some(nonce),
                TokenState::Unavailable => return None,
                // Invalidated while waiting.
                TokenState::Idle => {
                    self.cache.ensure_fetch();
                }
                TokenState::Pending => {}
            }
        }
    }
}
