//! Envelope decoder: strips the service's response framing and deserializes
//! the payload into the caller's type.
//!
//! # Design
//! The service prepends `)]}'` and a line break to JSON answers so they
//! cannot be evaluated through a `<script>` tag. Some endpoints answer with
//! a JSON-quoted string and a few with bare text. All of that is handled
//! here so the request and transport stages stay protocol-agnostic.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::endpoint::ResponseShape;
use crate::error::{body_snippet, ApiError};
use crate::http::HttpResponse;

/// Anti-XSSI marker prepended to JSON response bodies.
pub const MAGIC_PREFIX: &[u8] = b")]}'";

/// Remove the magic prefix and the line break after it, if present.
pub fn strip_magic_prefix(body: &[u8]) -> &[u8] {
    match body.strip_prefix(MAGIC_PREFIX) {
        Some(rest) => rest
            .strip_prefix(b"\r\n")
            .or_else(|| rest.strip_prefix(b"\n"))
            .unwrap_or(rest),
        None => body,
    }
}

/// Decode a 2xx response body into `T` according to `shape`.
///
/// Status codes are not checked here; run `check_status` first.
pub fn decode<T: DeserializeOwned>(response: &HttpResponse, shape: ResponseShape) -> Result<T, ApiError> {
    let payload = strip_magic_prefix(&response.body);
    let decoded = match shape {
        ResponseShape::None => serde_json::from_value(Value::Null),
        ResponseShape::Json => serde_json::from_slice(payload),
        ResponseShape::Scalar => decode_scalar(payload),
    };
    decoded.map_err(|source| ApiError::DecodeError {
        status: response.status,
        body: body_snippet(&response.body),
        source,
    })
}

/// A JSON scalar (usually a quoted string) or, when the body is not JSON at
/// all, the trimmed text itself. Text that opens like JSON but fails to parse
/// is an error, not bare text.
fn decode_scalar<T: DeserializeOwned>(payload: &[u8]) -> Result<T, serde_json::Error> {
    let value = match serde_json::from_slice::<Value>(payload) {
        Ok(value @ (Value::Array(_) | Value::Object(_))) => {
            return Err(serde::de::Error::custom(format!(
                "expected a scalar, found a JSON {}",
                if value.is_array() { "array" } else { "object" }
            )));
        }
        Ok(value) => value,
        Err(e) => match std::str::from_utf8(payload) {
            Ok(text) if is_bare_text(text.trim()) => Value::String(text.trim().to_string()),
            _ => return Err(e),
        },
    };
    serde_json::from_value(value)
}

fn is_bare_text(text: &str) -> bool {
    !text.is_empty() && !text.starts_with(['"', '{', '['])
}
