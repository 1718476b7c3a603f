//! Transport seam: the single place where the network is touched.
//!
//! # Design
//! A `Transport` executes one fully prepared `HttpRequest` and returns
//! whatever the server answered, 2xx or not. It fails only when no response
//! was obtained. There is no retry loop: key uploads and other writes are
//! not idempotent, so retrying is left to the caller.

use std::time::Duration;

use crate::error::{TransportError, TransportErrorKind};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes HTTP exchanges for a `GerritClient`.
///
/// Implementations must be shareable across threads; the client calls
/// `execute` concurrently from every caller holding it.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by a `ureq` agent.
///
/// Status codes are returned as data, never as errors, and the agent's
/// connection pool is shared by every call.
///
/// Response bodies are read without a size cap unless `with_body_limit`
/// sets one; large list and query answers are normal for this API.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    body_limit: u64,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            body_limit: u64::MAX,
        }
    }

    /// Fail with a transport error when a response body exceeds `bytes`.
    pub fn with_body_limit(mut self, bytes: u64) -> Self {
        self.body_limit = bytes;
        self
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let timeout = request.timeout;

        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), request, timeout).call(),
            (HttpMethod::Delete, _) => with_headers(self.agent.delete(url), request, timeout).call(),
            (HttpMethod::Post, Some(body)) => with_headers(self.agent.post(url), request, timeout).send(body.as_bytes()),
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), request, timeout).send_empty(),
            (HttpMethod::Put, Some(body)) => with_headers(self.agent.put(url), request, timeout).send(body.as_bytes()),
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), request, timeout).send_empty(),
        };
        let mut response = result.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(self.body_limit)
            .read_to_vec()
            .map_err(transport_error)?;

        Ok(HttpResponse { status, headers, body })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &HttpRequest,
    timeout: Option<Duration>,
) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.config().timeout_global(timeout).build()
}

fn transport_error(err: ureq::Error) -> TransportError {
    let kind = match &err {
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => TransportErrorKind::Connect,
        ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
        ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::ConnectionRefused => TransportErrorKind::Connect,
        ureq::Error::Io(_) => TransportErrorKind::Io,
        _ => TransportErrorKind::Other,
    };
    TransportError::new(kind, err.to_string()).with_source(err)
}
