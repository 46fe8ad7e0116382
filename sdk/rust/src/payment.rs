//! Hosted payment widget outcomes.

use serde_json::Value;

use crate::error::SdkError;

const MAX_AMOUNT_CHARS: usize = 10;

/// Validate a user-entered amount before asking for a payment session.
/// Only positive whole amounts are accepted.
pub fn validate_amount(raw: &str) -> Result<serde_json::Number, SdkError> {
    let raw = raw.trim();
    if raw.chars().count() > MAX_AMOUNT_CHARS {
        return Err(SdkError::InvalidAmount("Amount is too large."));
    }
    match raw.parse::<u64>() {
        Ok(amount) if amount > 0 => Ok(amount.into()),
        _ => Err(SdkError::InvalidAmount(
            "Please enter a valid whole payment amount greater than zero.",
        )),
    }
}

/// What the hosted widget reported through its callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetOutcome {
    Approved(Value),
    Declined(Value),
    Cancelled,
    Error(String),
}

impl WidgetOutcome {
    /// Build from the callback name (`onApproval`, `onDeclined`, `onCancelled`,
    /// `onError`) and its payload.
    pub fn from_callback(name: &str, payload: Value) -> Self {
        match name {
            "onApproval" => WidgetOutcome::Approved(payload),
            "onDeclined" => WidgetOutcome::Declined(payload),
            "onCancelled" => WidgetOutcome::Cancelled,
            "onError" => WidgetOutcome::Error(match payload {
                Value::String(message) => message,
                other => other.to_string(),
            }),
            other => WidgetOutcome::Error(format!("Unknown widget callback: {}", other)),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, WidgetOutcome::Approved(_))
    }
}

/// Payment form state, from entering an amount to the widget's verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentStatus {
    Idle,
    RequestingToken,
    TokenReady(String),
    Approved(Value),
    Declined(Value),
    Cancelled,
    Failed(String),
}

impl PaymentStatus {
    /// Result of a payment session request.
    pub fn on_session(self, result: Result<String, SdkError>) -> Self {
        match result {
            Ok(token) => PaymentStatus::TokenReady(token),
            Err(SdkError::InvalidAmount(message)) => PaymentStatus::Failed(message.to_string()),
            Err(SdkError::TokenUnavailable) => {
                PaymentStatus::Failed("Security token not ready. Please try again.".to_string())
            }
            Err(SdkError::Session { message, .. }) => PaymentStatus::Failed(message),
            Err(_) => PaymentStatus::Failed("Payment system error. Please try again.".to_string()),
        }
    }

    /// Apply a widget outcome. Only a status holding a token can open the widget.
    pub fn on_widget(self, outcome: WidgetOutcome) -> Self {
        match self {
            PaymentStatus::TokenReady(_) => match outcome {
                WidgetOutcome::Approved(payload) => PaymentStatus::Approved(payload),
                WidgetOutcome::Declined(payload) => PaymentStatus::Declined(payload),
                WidgetOutcome::Cancelled => PaymentStatus::Cancelled,
                WidgetOutcome::Error(message) => PaymentStatus::Failed(message),
            },
            other => other,
        }
    }

    /// The single line shown to the user.
    pub fn message(&self) -> String {
        match self {
            PaymentStatus::Idle => String::new(),
            PaymentStatus::RequestingToken => "Requesting Token...".to_string(),
            PaymentStatus::TokenReady(_) => "Token received".to_string(),
            PaymentStatus::Approved(_) => "Payment approved. Thank you!".to_string(),
            PaymentStatus::Declined(_) => "Payment was declined.".to_string(),
            PaymentStatus::Cancelled => "Payment was cancelled.".to_string(),
            PaymentStatus::Failed(message) => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_amount() {
        assert_eq!(validate_amount("100").unwrap(), serde_json::Number::from(100u64));
        assert_eq!(validate_amount(" 42 ").unwrap().as_u64(), Some(42));
        for rejected in ["0", "-3", "abc", "12.5", "100.0", "1e3", ""] {
            assert!(
                matches!(validate_amount(rejected), Err(SdkError::InvalidAmount(_))),
                "{} should be rejected",
                rejected
            );
        }
        assert!(matches!(
            validate_amount("12345678901"),
            Err(SdkError::InvalidAmount("Amount is too large."))
        ));
    }

    #[test]
    fn test_from_callback() {
        let payload = json!({"ssl_result_message": "APPROVAL"});
        assert_eq!(
            WidgetOutcome::from_callback("onApproval", payload.clone()),
            WidgetOutcome::Approved(payload)
        );
        assert_eq!(
            WidgetOutcome::from_callback("onCancelled", Value::Null),
            WidgetOutcome::Cancelled
        );
        assert_eq!(
            WidgetOutcome::from_callback("onError", json!("card reader offline")),
            WidgetOutcome::Error("card reader offline".into())
        );
    }

    #[test]
    fn test_status_flow() {
        let status = PaymentStatus::RequestingToken.on_session(Ok("tok-1234567890".into()));
        assert_eq!(status, PaymentStatus::TokenReady("tok-1234567890".into()));

        let declined = status.clone().on_widget(WidgetOutcome::Declined(json!({})));
        assert_eq!(declined.message(), "Payment was declined.");

        let approved = status.on_widget(WidgetOutcome::Approved(json!({"ssl_txn_id": "1"})));
        assert!(matches!(approved, PaymentStatus::Approved(_)));

        // Without a token the widget outcome is ignored.
        assert_eq!(
            PaymentStatus::Idle.on_widget(WidgetOutcome::Cancelled),
            PaymentStatus::Idle
        );
    }

    #[test]
    fn test_session_failure_message() {
        let status = PaymentStatus::RequestingToken.on_session(Err(SdkError::TokenUnavailable));
        assert_eq!(status.message(), "Security token not ready. Please try again.");
    }
}
