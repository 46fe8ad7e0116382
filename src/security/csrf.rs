//! CSRF token issuance and verification (double-submit cookie).
//!
//! Issuance mints a random nonce and an HMAC-SHA256 signature of it. Both go out as
//! `HttpOnly` cookies and the nonce is also returned in the body so page scripts
//! can echo it in the `x-csrf` header. Verification needs all three values, an
//! exact header/cookie nonce match, and a signature that recomputes under the
//! server secret.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::CsrfConfig;

type HmacSha256 = Hmac<Sha256>;

pub const NONCE_COOKIE: &str = "csrf_nonce";
pub const SIGNATURE_COOKIE: &str = "csrf_sig";
pub const CSRF_HEADER: &str = "x-csrf";

/// Nonce length in bytes (hex-encoded to twice this).
const NONCE_BYTES: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsrfError {
    /// No signing secret configured. Distinct from an unauthenticated request.
    #[error("CSRF secret is not configured")]
    SecretUnconfigured,
}

/// A freshly minted nonce and its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfPair {
    pub nonce: String,
    pub signature: String,
}

/// Why a request failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingCookieNonce,
    MissingCookieSignature,
    MissingHeader,
    NonceMismatch,
    BadSignature,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::MissingCookieNonce => "missing_cookie_nonce",
            Rejection::MissingCookieSignature => "missing_cookie_signature",
            Rejection::MissingHeader => "missing_header",
            Rejection::NonceMismatch => "nonce_mismatch",
            Rejection::BadSignature => "bad_signature",
        }
    }
}

/// Signs and verifies CSRF nonces under one secret.
#[derive(Clone)]
pub struct CsrfService {
    secret: Option<String>,
    enabled: bool,
    secure_cookies: bool,
}

impl CsrfService {
    pub fn new(secret: Option<String>, enabled: bool, secure_cookies: bool) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            enabled,
            secure_cookies,
        }
    }

    pub fn from_config(config: &CsrfConfig) -> Self {
        Self::new(config.secret.clone(), config.enabled, config.production)
    }

    /// Whether verification is enforced at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn secret(&self) -> Result<&str, CsrfError> {
        self.secret.as_deref().ok_or(CsrfError::SecretUnconfigured)
    }

    /// Mint a new nonce/signature pair.
    pub fn issue(&self) -> Result<CsrfPair, CsrfError> {
        let secret = self.secret()?;
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let nonce = hex::encode(bytes);
        let signature = sign(&nonce, secret);
        Ok(CsrfPair { nonce, signature })
    }

    /// Add both cookies for `pair` to `jar`.
    pub fn set_cookies(&self, jar: CookieJar, pair: &CsrfPair) -> CookieJar {
        jar.add(self.cookie(NONCE_COOKIE, pair.nonce.clone()))
            .add(self.cookie(SIGNATURE_COOKIE, pair.signature.clone()))
    }

    fn cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .path("/")
            .build()
    }

    /// Verify the cookies and echoed header of a request.
    ///
    /// Returns `Ok(Err(_))` for an unauthenticated request and `Err(_)` when the
    /// service itself is misconfigured.
    pub fn verify(&self, headers: &HeaderMap) -> Result<Result<(), Rejection>, CsrfError> {
        let jar = CookieJar::from_headers(headers);
        let nonce = jar.get(NONCE_COOKIE).map(|c| c.value().to_string()).unwrap_or_default();
        let signature = jar.get(SIGNATURE_COOKIE).map(|c| c.value().to_string()).unwrap_or_default();
        let header_nonce = headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        self.verify_parts(&nonce, &signature, header_nonce)
    }

    /// Verify already-extracted values.
    pub fn verify_parts(
        &self,
        cookie_nonce: &str,
        cookie_signature: &str,
        header_nonce: &str,
    ) -> Result<Result<(), Rejection>, CsrfError> {
        let rejection = if cookie_nonce.is_empty() {
            Some(Rejection::MissingCookieNonce)
        } else if cookie_signature.is_empty() {
            Some(Rejection::MissingCookieSignature)
        } else if header_nonce.is_empty() {
            Some(Rejection::MissingHeader)
        } else if header_nonce != cookie_nonce {
            Some(Rejection::NonceMismatch)
        } else {
            None
        };

        if let Some(rejection) = rejection {
            tracing::warn!(
                has_cookie_nonce = !cookie_nonce.is_empty(),
                has_cookie_sig = !cookie_signature.is_empty(),
                has_header = !header_nonce.is_empty(),
                nonce_match = header_nonce == cookie_nonce,
                "CSRF verification failed"
            );
            return Ok(Err(rejection));
        }

        let expected = sign(cookie_nonce, self.secret()?);
        if constant_time_eq(&expected, cookie_signature) {
            Ok(Ok(()))
        } else {
            tracing::warn!("CSRF signature mismatch");
            Ok(Err(Rejection::BadSignature))
        }
    }
}

/// Hex-encoded HMAC-SHA256 of `nonce` under `secret`.
pub fn sign(nonce: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(nonce.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
