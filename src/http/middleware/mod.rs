//! Per-route middleware.

pub mod guard;

pub use guard::{guard, Guard, GuardOptions, RateLimitSetting, SessionCookieRule};
