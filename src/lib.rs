//! Accounting practice site: pages, CSRF-protected API routes, hosted payments.

pub mod config;
pub mod email;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod payments;
pub mod security;

pub use config::schema::SiteConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
