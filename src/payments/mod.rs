//! Hosted payment sessions.
//!
//! # Data Flow
//! ```text
//! POST /api/payment/session (guarded)
//!     → types.rs (validate {amount, invoiceNumber})
//!     → gateway.rs (form POST to the gateway, optionally through a proxy)
//!     → validate token → {success, token} | {success:false, error, errorCode}
//! ```

pub mod gateway;
pub mod types;

pub use gateway::{ConvergeGateway, GatewayError, PaymentGateway};
pub use types::{CreateSessionRequest, CreateSessionResponse, SessionErrorCode, TokenRequest};
