//! Common response envelope and message extraction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message used when a failed response carries no body at all.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// The `{status, message}` pair every API response starts with.
///
/// Both fields are optional: some endpoints omit `message` on success and
/// proxies in front of the API may return bodies that are not JSON at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusEnvelope {
    /// Try to decode the envelope. Returns `None` for non-JSON or non-object bodies.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// True when the API explicitly reported `"status": "error"`.
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some(crate::STATUS_ERROR)
    }
}

/// Extract a human-readable message from a response body.
///
/// Decodes the body as a JSON object and returns its `message` field; a
/// non-string `message` is rendered as JSON text. When the body is not JSON,
/// is not an object, or has no (or a null) `message`, the raw body text is
/// returned instead. An empty body yields [`UNKNOWN_ERROR`].
pub fn extract_message(body: &[u8]) -> String {
    let raw = String::from_utf8_lossy(body);
    if raw.trim().is_empty() {
        return UNKNOWN_ERROR.to_string();
    }

    let value: Option<Value> = serde_json::from_slice(body).ok();
    match value.as_ref().and_then(|v| v.get("message")) {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Null) | None => raw.into_owned(),
        Some(other) => other.to_string(),
    }
}
