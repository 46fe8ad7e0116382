//! Approval-email notification.
//!
//! # Data Flow
//! ```text
//! POST /api/email/payment/approval (guarded)
//!     → template.rs (subject + escaped HTML body)
//!     → sender.rs (transactional email API)
//!     → {success, id} | {success:false, error}
//! ```

pub mod sender;
pub mod template;

pub use sender::{EmailError, EmailMessage, EmailSender, ResendEmailSender};
pub use template::ApprovalNotice;
