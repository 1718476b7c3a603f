//! Error taxonomy for the client core and the status-code mapper.
//!
//! # Design
//! Every call ends in exactly one `ApiError` or a decoded value. The variant
//! says which stage failed: `InvalidRequest` is raised before any I/O,
//! `NetworkError` when no response was obtained, `ClientError`/`ServerError`
//! when the service answered with a failure status, and `DecodeError` when a
//! 2xx body could not be read as the declared shape. Status, body snippet
//! and underlying cause stay reachable for diagnostics.

use thiserror::Error;

use crate::http::HttpResponse;

/// Maximum number of body bytes kept on an error for diagnostics.
pub const BODY_SNIPPET_LIMIT: usize = 1024;

/// Errors returned by `GerritClient` and its stages.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The caller asked for something that cannot be sent, such as a
    /// missing path parameter. Raised before any network call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No response was obtained: connection refused, DNS, TLS or timeout.
    #[error("network error: {source}")]
    NetworkError {
        #[source]
        source: TransportError,
    },

    /// The service answered with a 4xx status (or another non-2xx status
    /// that is not a server failure).
    #[error("HTTP {status}: {body}")]
    ClientError { status: u16, body: String },

    /// The service answered with a 5xx status.
    #[error("HTTP {status} (server error): {body}")]
    ServerError { status: u16, body: String },

    /// A 2xx body did not match the declared response shape.
    #[error("could not decode HTTP {status} response: {source}")]
    DecodeError {
        status: u16,
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// The HTTP status the service answered with, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ClientError { status, .. }
            | ApiError::ServerError { status, .. }
            | ApiError::DecodeError { status, .. } => Some(*status),
            ApiError::InvalidRequest(_) | ApiError::NetworkError { .. } => None,
        }
    }

    /// The response body snippet, if a response was received.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::ClientError { body, .. }
            | ApiError::ServerError { body, .. }
            | ApiError::DecodeError { body, .. } => Some(body),
            ApiError::InvalidRequest(_) | ApiError::NetworkError { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::NetworkError { source } if source.kind() == TransportErrorKind::Timeout)
    }

    /// Whether a caller-side retry policy may try the call again. Only
    /// meaningful for idempotent operations; the core never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::NetworkError { .. } | ApiError::ServerError { .. })
    }
}

impl From<TransportError> for ApiError {
    fn from(source: TransportError) -> Self {
        ApiError::NetworkError { source }
    }
}

/// Broad classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The exchange did not complete within the call's timeout.
    Timeout,
    /// The host could not be resolved or the connection was refused.
    Connect,
    /// Reading or writing the exchange failed.
    Io,
    /// The request could not be handed to the HTTP stack at all.
    Other,
}

/// A failure raised by a `Transport` when no response was obtained.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }
}

/// Map non-2xx status codes to `ClientError` or `ServerError`.
///
/// The response is handed back untouched on success so the decoder can
/// consume it.
pub fn check_status(response: HttpResponse) -> Result<HttpResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    let status = response.status;
    let body = body_snippet(&response.body);
    if status >= 500 {
        Err(ApiError::ServerError { status, body })
    } else {
        Err(ApiError::ClientError { status, body })
    }
}

/// Lossy UTF-8 rendering of `body`, cut at a char boundary to at most
/// `BODY_SNIPPET_LIMIT` bytes.
pub(crate) fn body_snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= BODY_SNIPPET_LIMIT {
        return text.into_owned();
    }
    let mut end = BODY_SNIPPET_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
