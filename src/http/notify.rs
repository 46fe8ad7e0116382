//! `POST /api/email/payment/approval`: tell the practice a payment was approved.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::email::{ApprovalNotice, EmailMessage};
use crate::http::response::Tools;
use crate::http::server::AppState;
use crate::observability::metrics;

pub async fn send_approval(State(state): State<AppState>, tools: Tools, body: Bytes) -> Response {
    let notice: ApprovalNotice = match serde_json::from_slice(&body) {
        Ok(notice) => notice,
        Err(_) => return tools.bad_request(Some("Invalid body")),
    };

    let message = EmailMessage {
        from: state.config.email.from.clone(),
        to: vec![state.config.email.to.clone()],
        subject: notice.subject(),
        html: notice.render_html(),
    };

    match state.email.send(message).await {
        Ok(id) => {
            tracing::info!(invoice = %notice.invoice_id, id = %id, "Approval email sent");
            metrics::record_email("sent");
            tools.ok(json!({ "success": true, "id": id }))
        }
        Err(e) => {
            tracing::error!(invoice = %notice.invoice_id, error = %e, "Approval email failed");
            metrics::record_email("failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Failed to send email" })),
            )
                .into_response()
        }
    }
}
