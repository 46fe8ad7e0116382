//! Informational pages and the payment landing pages.
//!
//! Copy is intentionally thin; the payment pages only need the invoice context
//! and the gateway's redirect parameters.

use std::collections::HashMap;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::http::html::escape_html;

const PRACTICE_NAME: &str = "Accounting Practice";

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(home))
        .route("/about", get(about))
        .route("/services", get(services))
        .route("/contact", get(contact))
        .route("/payment", get(payment))
        .route("/payment/complete", get(payment_complete))
        .route("/payment/{invoice}", get(invoice_payment))
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>{title} | {name}</title></head><body>\
         <nav><a href=\"/\">Home</a> <a href=\"/about\">About</a> \
         <a href=\"/services\">Services</a> <a href=\"/contact\">Contact</a> \
         <a href=\"/payment\">Pay Invoice</a></nav>\
         <main>{body}</main><footer>&copy; {name}</footer></body></html>",
        title = escape_html(title),
        name = PRACTICE_NAME,
        body = body,
    ))
}

async fn home() -> Html<String> {
    layout(
        "Home",
        "<h1>Trusted accounting for individuals and small businesses</h1>\
         <p>Tax preparation, bookkeeping and advisory services.</p>",
    )
}

async fn about() -> Html<String> {
    layout("About", "<h1>About the practice</h1><p>Independent certified public accountants.</p>")
}

async fn services() -> Html<String> {
    layout(
        "Services",
        "<h1>Services</h1><ul><li>Individual tax returns</li><li>Business tax returns</li>\
         <li>Bookkeeping and payroll</li><li>Tax planning</li></ul>",
    )
}

async fn contact() -> Html<String> {
    layout("Contact", "<h1>Contact</h1><p>Call or email the office to schedule a consultation.</p>")
}

fn payment_form(invoice: Option<&str>, amount: Option<&str>) -> String {
    let invoice_field = match invoice {
        Some(inv) => format!(
            "<input type=\"text\" name=\"invoiceNumber\" value=\"{}\" readonly>",
            escape_html(inv)
        ),
        None => "<input type=\"text\" name=\"invoiceNumber\" placeholder=\"INV-2024-001\">".to_string(),
    };
    let amount_field = match amount {
        Some(a) => format!(
            "<input type=\"number\" name=\"amount\" min=\"1\" step=\"1\" value=\"{}\" readonly>",
            escape_html(a)
        ),
        None => "<input type=\"number\" name=\"amount\" min=\"1\" step=\"1\" required>".to_string(),
    };
    format!(
        "<form id=\"payment-form\" data-session-endpoint=\"/api/payment/session\">\
         <label>First Name <input type=\"text\" name=\"firstName\" required></label>\
         <label>Last Name <input type=\"text\" name=\"lastName\" required></label>\
         <label>Amount {amount_field}</label>\
         <label>Invoice Number {invoice_field}</label>\
         <button type=\"submit\">Get Payment Token</button></form>"
    )
}

async fn payment() -> Html<String> {
    layout(
        "Pay Invoice",
        &format!("<h1>Make a Payment</h1>{}", payment_form(None, None)),
    )
}

async fn invoice_payment(
    Path(invoice): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if invoice.chars().count() < 3 {
        return (StatusCode::NOT_FOUND, layout("Not Found", "<h1>Invoice not found</h1>")).into_response();
    }
    let body = format!(
        "<h1>Pay Invoice</h1><p><strong>Invoice #:</strong> {}</p>{}",
        escape_html(&invoice),
        payment_form(Some(&invoice), query.get("amount").map(String::as_str)),
    );
    layout("Pay Invoice", &body).into_response()
}

/// Lines shown on the completion page, from the gateway's redirect query.
pub fn completion_details(query: &HashMap<String, String>) -> Vec<(&'static str, String)> {
    let get = |key: &str| query.get(key).filter(|v| !v.is_empty());
    let mut lines = Vec::new();

    if let Some(v) = get("ssl_result_message") {
        lines.push(("Status", v.clone()));
    }
    if let Some(v) = get("ssl_invoice_number") {
        lines.push(("Invoice", v.clone()));
    }
    if let Some(v) = get("ssl_amount") {
        lines.push(("Amount", format!("${}", v)));
    }
    if let Some(v) = get("ssl_approval_code") {
        lines.push(("Approval Code", v.clone()));
    }
    if let (Some(card), Some(number)) = (get("ssl_card_short_description"), get("ssl_card_number")) {
        let chars: Vec<char> = number.chars().collect();
        let last4: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        lines.push(("Card", format!("{} ending in {}", card, last4)));
    }
    if let Some(v) = get("ssl_txn_id") {
        lines.push(("Transaction ID", v.clone()));
    }
    lines
}

async fn payment_complete(Query(query): Query<HashMap<String, String>>) -> Html<String> {
    let details: String = completion_details(&query)
        .into_iter()
        .map(|(label, value)| format!("<p><strong>{}:</strong> {}</p>", label, escape_html(&value)))
        .collect();
    layout(
        "Payment Complete",
        &format!(
            "<h1>Payment Complete</h1><p>Thank you for your payment.</p>\
             <section>{}</section><a href=\"/\">Return Home</a>",
            details
        ),
    )
}
