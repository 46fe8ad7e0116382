//! Rust client for the accounting site's API.
//!
//! - [`token`]: the shared CSRF token cache (one fetch serves every consumer)
//! - [`client`]: guarded API calls carrying `x-csrf` and `Origin`
//! - [`payment`]: hosted-widget outcomes and the payment status state machine
//! - [`notify`]: fire-and-forget approval notification

pub mod client;
pub mod error;
pub mod notify;
pub mod payment;
pub mod token;

pub use client::SiteClient;
pub use error::SdkError;
pub use notify::{notify_on_approval, ApprovalNotice, ApprovalSink, HttpApprovalSink};
pub use payment::{validate_amount, PaymentStatus, WidgetOutcome};
pub use token::{
    CsrfTokenCache, FetchAttempt, HttpTokenFetcher, RetryPolicy, TokenFetcher, TokenState,
    TokenSubscription,
};
