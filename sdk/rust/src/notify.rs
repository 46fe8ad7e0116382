//! Fire-and-forget approval notification.

use serde::Serialize;

use crate::client::SiteClient;
use crate::payment::WidgetOutcome;

/// Body of `POST /api/email/payment/approval`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalNotice {
    pub invoice_id: String,
    pub amount: f64,
    pub email: String,
    pub response_json: String,
}

/// Receives approval notices. `dispatch` must return immediately.
pub trait ApprovalSink: Send + Sync {
    fn dispatch(&self, notice: ApprovalNotice);
}

/// Posts notices to the site in a background task; failures are only logged.
#[derive(Clone)]
pub struct HttpApprovalSink {
    client: SiteClient,
}

impl HttpApprovalSink {
    pub fn new(client: SiteClient) -> Self {
        Self { client }
    }
}

impl ApprovalSink for HttpApprovalSink {
    fn dispatch(&self, notice: ApprovalNotice) {
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.send_approval(&notice).await {
                Ok(id) => tracing::info!(invoice = %notice.invoice_id, id = %id, "Approval email sent"),
                Err(e) => {
                    tracing::error!(invoice = %notice.invoice_id, error = %e, "Approval email failed")
                }
            }
        });
    }
}

/// Dispatch an approval notice when `outcome` is an approval. Returns whether one was sent.
pub fn notify_on_approval(
    sink: &dyn ApprovalSink,
    outcome: &WidgetOutcome,
    invoice_id: &str,
    amount: f64,
    email: &str,
) -> bool {
    let WidgetOutcome::Approved(payload) = outcome else {
        return false;
    };
    sink.dispatch(ApprovalNotice {
        invoice_id: invoice_id.to_string(),
        amount,
        email: email.to_string(),
        response_json: payload.to_string(),
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<ApprovalNotice>>);

    impl ApprovalSink for RecordingSink {
        fn dispatch(&self, notice: ApprovalNotice) {
            self.0.lock().unwrap().push(notice);
        }
    }

    #[test]
    fn test_only_approvals_are_dispatched() {
        let sink = RecordingSink::default();
        let declined = WidgetOutcome::Declined(json!({"ssl_result_message": "DECLINED"}));
        assert!(!notify_on_approval(&sink, &declined, "INV-1", 10.0, "a@b.c"));
        assert!(!notify_on_approval(&sink, &WidgetOutcome::Cancelled, "INV-1", 10.0, "a@b.c"));

        let approved = WidgetOutcome::Approved(json!({"ssl_txn_id": "T1"}));
        assert!(notify_on_approval(&sink, &approved, "INV-1", 10.0, "a@b.c"));

        let sent = sink.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].invoice_id, "INV-1");
        assert_eq!(sent[0].response_json, r#"{"ssl_txn_id":"T1"}"#);
    }

    #[test]
    fn test_notice_wire_names() {
        let notice = ApprovalNotice {
            invoice_id: "INV-9".into(),
            amount: 25.0,
            email: "client@example.com".into(),
            response_json: "{}".into(),
        };
        let value = serde_json::to_value(&notice).unwrap();
        assert_eq!(
            value,
            json!({"invoiceId": "INV-9", "amount": 25.0, "email": "client@example.com", "responseJson": "{}"})
        );
    }
}
