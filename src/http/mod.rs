//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, shared state, layers)
//!     → request.rs (request ID)
//!     → middleware/guard.rs (rate limit, session, origin, CSRF)
//!     → csrf.rs | payment.rs | notify.rs | pages.rs
//!     → response.rs (JSON helpers), html.rs (escaping)
//!     → Send to client
//! ```

pub mod csrf;
pub mod html;
pub mod middleware;
pub mod notify;
pub mod pages;
pub mod payment;
pub mod request;
pub mod response;
pub mod server;

pub use html::escape_html;
pub use request::X_REQUEST_ID;
pub use response::Tools;
pub use server::{AppState, HttpServer, ServerError};
