//! Endpoint descriptors and per-call parameters.
//!
//! # Design
//! An `Endpoint` is a static description of one logical operation: method,
//! path template, how the request body is encoded and what shape the
//! response has. Resource facades declare them as `const` items and pass
//! them to `GerritClient::invoke` together with the call's `Params`.

use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpMethod;

/// How a request body is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// The endpoint takes no body.
    None,
    /// JSON-serialized, sent as `application/json`.
    Json,
    /// A string sent verbatim as `text/plain`, without JSON quoting.
    RawText,
}

/// What the response body holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Nothing worth reading; the body is ignored.
    None,
    /// A JSON object or array.
    Json,
    /// A bare scalar, usually a JSON-quoted string.
    Scalar,
}

/// Static definition of one API operation.
///
/// ```
/// use gerrit_core::Endpoint;
///
/// const ADD_SSH_KEY: Endpoint = Endpoint::post("accounts/{account_id}/sshkeys").with_text_body();
/// assert_eq!(ADD_SSH_KEY.placeholders().collect::<Vec<_>>(), ["account_id"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub method: HttpMethod,
    /// Path relative to the base URL, with `{name}` placeholders.
    pub path: &'static str,
    pub body: BodyEncoding,
    pub response: ResponseShape,
}

impl Endpoint {
    pub const fn new(method: HttpMethod, path: &'static str) -> Self {
        Self {
            method,
            path,
            body: BodyEncoding::None,
            response: ResponseShape::Json,
        }
    }

    pub const fn get(path: &'static str) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub const fn post(path: &'static str) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub const fn put(path: &'static str) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// A `DELETE` endpoint; these answer `204 No Content`.
    pub const fn delete(path: &'static str) -> Self {
        Self::new(HttpMethod::Delete, path).returns_nothing()
    }

    pub const fn with_json_body(mut self) -> Self {
        self.body = BodyEncoding::Json;
        self
    }

    pub const fn with_text_body(mut self) -> Self {
        self.body = BodyEncoding::RawText;
        self
    }

    pub const fn returns_json(mut self) -> Self {
        self.response = ResponseShape::Json;
        self
    }

    pub const fn returns_scalar(mut self) -> Self {
        self.response = ResponseShape::Scalar;
        self
    }

    pub const fn returns_nothing(mut self) -> Self {
        self.response = ResponseShape::None;
        self
    }

    /// Placeholder names in template order. Stops at a malformed brace; the
    /// request builder reports that case.
    pub fn placeholders(&self) -> impl Iterator<Item = &'static str> {
        let mut rest = self.path;
        std::iter::from_fn(move || {
            let open = rest.find('{')?;
            let close = rest[open..].find('}')? + open;
            let name = &rest[open + 1..close];
            rest = &rest[close + 1..];
            Some(name)
        })
    }
}

/// Path parameter values and query pairs for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pub(crate) path: Vec<(String, String)>,
    pub(crate) query: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for the `{name}` placeholder. The value is percent-encoded when
    /// the URL is built.
    pub fn path(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.push((name.into(), value.into()));
        self
    }

    /// Append one query pair. Repeated keys are kept in order.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Flatten an options struct into query pairs.
    ///
    /// Null fields are skipped, arrays become repeated keys and scalars use
    /// their plain rendering, so `{"q": "john", "o": ["A", "B"]}` becomes
    /// `q=john&o=A&o=B`. Anything but a JSON object, or nested objects, are
    /// rejected.
    pub fn query_from<T: Serialize + ?Sized>(mut self, options: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(options)
            .map_err(|e| ApiError::InvalidRequest(format!("query options: {e}")))?;
        let Value::Object(fields) = value else {
            return Err(ApiError::InvalidRequest("query options must serialize to an object".to_string()));
        };
        for (key, value) in fields {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        let rendered = render_query_value(&key, item)?;
                        self.query.push((key.clone(), rendered));
                    }
                }
                other => {
                    let rendered = render_query_value(&key, other)?;
                    self.query.push((key, rendered));
                }
            }
        }
        Ok(self)
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }
}

fn render_query_value(key: &str, value: Value) -> Result<String, ApiError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(ApiError::InvalidRequest(format!(
            "query option `{key}` must be a scalar or a list of scalars"
        ))),
    }
}
