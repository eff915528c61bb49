use serde_json::Value;
use std::fmt;

use crate::util::format_params;

/// Structured failure raised for any unsuccessful API exchange.
///
/// Carries enough context (URL plus redacted request parameters) to
/// reproduce the request by hand. Surfaced through `anyhow::Error`, so
/// callers can `downcast_ref::<ApiError>()` when they need the fields.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status of the response. `200` is possible: some endpoints
    /// report logical failures in the body of an otherwise OK response.
    pub status_code: u16,
    /// Vendor error message, when the body carried one.
    pub message: Option<String>,
    /// Full request URL.
    pub url: String,
    /// Request query parameters with credential values redacted.
    pub params: Vec<(String, String)>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, url: {}, params: {}",
            self.status_code,
            self.message.as_deref().unwrap_or("(no vendor message)"),
            self.url,
            format_params(&self.params)
        )
    }
}

impl std::error::Error for ApiError {}

/// A vendor response decoded into success/failure before any business
/// logic looks at it. Some endpoints return an object with an `error`
/// key even on HTTP 200; others return plain arrays.
#[derive(Debug)]
pub(crate) enum Decoded {
    Payload(Value),
    Failure(String),
}

pub(crate) fn decode_body(value: Value) -> Decoded {
    if let Value::Object(map) = &value {
        if let Some(err) = map.get("error") {
            let message = match err {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Decoded::Failure(message);
        }
    }
    Decoded::Payload(value)
}

/// Best-effort extraction of a vendor error message from a raw body.
pub(crate) fn vendor_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match decode_body(value) {
        Decoded::Failure(message) => Some(message),
        Decoded::Payload(_) => None,
    }
}
