//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request on a guarded route:
//!     → headers.rs (resolve client key)
//!     → rate_limit.rs (per client+route budget)
//!     → origin.rs (Origin host must match Host)
//!     → csrf.rs (cookie nonce + signature + echoed header)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - All protective state is in memory and per process

pub mod csrf;
pub mod headers;
pub mod origin;
pub mod rate_limit;

pub use csrf::{CsrfError, CsrfPair, CsrfService};
pub use rate_limit::{Decision, RateLimiter};
