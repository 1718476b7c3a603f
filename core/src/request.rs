//! Request builder: endpoint descriptor + parameters + body → `HttpRequest`.
//!
//! Pure; performs no I/O and reads nothing but its arguments.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use url::Url;

use crate::endpoint::{BodyEncoding, Endpoint, Params};
use crate::error::ApiError;
use crate::http::HttpRequest;

/// Characters left unescaped in a path parameter value. `/` is escaped so a
/// project name such as `tools/gerrit` stays a single segment.
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Path prefix the service expects for authenticated REST access.
const AUTHENTICATED_PREFIX: &str = "a/";

pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";
pub(crate) const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Inputs from the session that shape every URL.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UrlContext<'a> {
    /// Base URL, always ending in `/`.
    pub base_url: &'a Url,
    /// Whether paths get the `a/` prefix.
    pub authenticated: bool,
}

pub(crate) fn build_request(
    ctx: UrlContext<'_>,
    endpoint: &Endpoint,
    params: &Params,
    body: Option<Value>,
) -> Result<HttpRequest, ApiError> {
    let path = render_path(endpoint.path, &params.path)?;
    let url = absolute_url(ctx, &path, &params.query)?;

    let mut headers = vec![("accept".to_string(), CONTENT_TYPE_JSON.to_string())];
    let body = encode_body(endpoint, body)?;
    if let Some((content_type, _)) = &body {
        headers.push(("content-type".to_string(), content_type.to_string()));
    }

    Ok(HttpRequest {
        method: endpoint.method,
        url,
        headers,
        body: body.map(|(_, text)| text),
        timeout: None,
    })
}

/// Substitute every `{name}` in `template` with the percent-encoded value.
fn render_path(template: &str, values: &[(String, String)]) -> Result<String, ApiError> {
    let mut rendered = String::with_capacity(template.len());
    let mut used = vec![false; values.len()];
    let mut rest = template.trim_start_matches('/');

    while let Some(open) = rest.find('{') {
        if rest[..open].contains('}') {
            return Err(ApiError::InvalidRequest(format!("stray `}}` in `{template}`")));
        }
        rendered.push_str(&rest[..open]);
        let close = rest[open..]
            .find('}')
            .map(|i| i + open)
            .ok_or_else(|| ApiError::InvalidRequest(format!("unterminated placeholder in `{template}`")))?;
        let name = &rest[open + 1..close];

        let index = values
            .iter()
            .position(|(key, _)| key == name)
            .ok_or_else(|| ApiError::InvalidRequest(format!("missing path parameter `{name}` for `{template}`")))?;
        let value = &values[index].1;
        if value.is_empty() {
            return Err(ApiError::InvalidRequest(format!(
                "path parameter `{name}` for `{template}` is empty"
            )));
        }
        if is_dot_segment(value) {
            return Err(ApiError::InvalidRequest(format!(
                "path parameter `{name}` for `{template}` cannot be `{value}`"
            )));
        }
        used[index] = true;
        rendered.extend(utf8_percent_encode(value, PATH_SEGMENT_ENCODE_SET));
        rest = &rest[close + 1..];
    }
    if rest.contains('}') {
        return Err(ApiError::InvalidRequest(format!("stray `}}` in `{template}`")));
    }
    rendered.push_str(rest);

    if let Some(index) = used.iter().position(|used| !used) {
        return Err(ApiError::InvalidRequest(format!(
            "path parameter `{}` is not used by `{template}`",
            values[index].0
        )));
    }
    Ok(rendered)
}

/// `.` and `..` (also percent-encoded) are resolved away by URL parsing.
fn is_dot_segment(value: &str) -> bool {
    let decoded = percent_decode_str(value).decode_utf8_lossy();
    matches!(value, "." | "..") || matches!(decoded.as_ref(), "." | "..")
}

fn absolute_url(ctx: UrlContext<'_>, path: &str, query: &[(String, String)]) -> Result<String, ApiError> {
    let prefix = if ctx.authenticated && !path.starts_with(AUTHENTICATED_PREFIX) {
        AUTHENTICATED_PREFIX
    } else {
        ""
    };
    let joined = format!("{}{prefix}{path}", ctx.base_url);
    let mut url = Url::parse(&joined).map_err(|e| ApiError::InvalidRequest(format!("invalid URL `{joined}`: {e}")))?;
    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    Ok(url.into())
}

/// Serialize `body` per the endpoint's encoding, returning the content type
/// and wire text.
fn encode_body(endpoint: &Endpoint, body: Option<Value>) -> Result<Option<(&'static str, String)>, ApiError> {
    let Some(body) = body else {
        return Ok(None);
    };
    if !endpoint.method.allows_body() {
        return Err(ApiError::InvalidRequest(format!(
            "{} {} cannot carry a request body",
            endpoint.method, endpoint.path
        )));
    }
    match endpoint.body {
        BodyEncoding::None => Err(ApiError::InvalidRequest(format!(
            "{} {} takes no request body",
            endpoint.method, endpoint.path
        ))),
        BodyEncoding::Json => {
            let text = serde_json::to_string(&body)
                .map_err(|e| ApiError::InvalidRequest(format!("request body: {e}")))?;
            Ok(Some((CONTENT_TYPE_JSON, text)))
        }
        BodyEncoding::RawText => match body {
            Value::String(text) => Ok(Some((CONTENT_TYPE_TEXT, text))),
            other => Err(ApiError::InvalidRequest(format!(
                "{} {} sends raw text, got a JSON {}",
                endpoint.method,
                endpoint.path,
                json_kind(&other)
            ))),
        },
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
