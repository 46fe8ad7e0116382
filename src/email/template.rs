//! Approval email rendering.

use serde::Deserialize;

use crate::http::escape_html;

/// Body of `POST /api/email/payment/approval`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalNotice {
    pub invoice_id: String,
    pub amount: f64,
    pub email: String,
    /// Raw widget response, kept for the record.
    #[serde(default)]
    pub response_json: String,
}

impl ApprovalNotice {
    pub fn subject(&self) -> String {
        format!("Payment Approval For Invoice {}", self.invoice_id)
    }

    pub fn render_html(&self) -> String {
        let invoice = escape_html(&self.invoice_id);
        format!(
            "<div><h1>Payment Approval for invoice {invoice}</h1>\
             <p>{email} has approved a payment of ${amount} for invoice {invoice}.</p></div>",
            invoice = invoice,
            email = escape_html(&self.email),
            amount = format_amount(self.amount),
        )
    }
}

/// Whole amounts print without decimals, others with two.
fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{:.0}", amount)
    } else {
        format!("{:.2}", amount)
    }
}
