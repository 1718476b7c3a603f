//! Client session tying the request builder, transport, error mapper and
//! envelope decoder together.
//!
//! # Design
//! `GerritClient` holds only immutable configuration plus a shared
//! `Transport`, so one instance can serve any number of threads. Each call
//! is split into stages that can also be driven one by one:
//! `build_request` (pure) → `execute` (one network exchange) →
//! `parse_response` (status mapping, then decoding). `invoke` runs all
//! three.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Auth, ClientConfig};
use crate::endpoint::{Endpoint, Params};
use crate::envelope;
use crate::error::{check_status, ApiError};
use crate::http::{HttpRequest, HttpResponse};
use crate::request::{build_request, UrlContext};
use crate::transport::{Transport, UreqTransport};

/// Authenticated client for a Gerrit-style REST API.
#[derive(Clone)]
pub struct GerritClient {
    base_url: Url,
    auth: Option<Auth>,
    timeout: Option<Duration>,
    user_agent: String,
    headers: Vec<(String, String)>,
    auth_path_prefix: bool,
    transport: Arc<dyn Transport>,
}

impl GerritClient {
    /// Client for `base_url` without credentials, using the default
    /// blocking transport.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::from_config(ClientConfig::new(base_url))
    }

    pub fn from_config(config: ClientConfig) -> Result<Self, ApiError> {
        Self::with_transport(config, Arc::new(UreqTransport::new()))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self, ApiError> {
        let timeout = config.timeout();
        let (base_url, url_auth) = parse_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            auth: config.auth.or(url_auth),
            timeout,
            user_agent: config.user_agent,
            headers: config.headers.into_iter().collect(),
            auth_path_prefix: config.auth_path_prefix,
            transport,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Run one call end to end: build, send once, map the status, decode.
    pub fn invoke<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        params: &Params,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let request = self.build_request(endpoint, params, body)?;
        let response = self.execute(request)?;
        self.parse_response(endpoint, response)
    }

    /// Build the request for `endpoint` without touching the network.
    ///
    /// Credentials and session headers are not attached yet; `execute`
    /// adds them.
    pub fn build_request(
        &self,
        endpoint: &Endpoint,
        params: &Params,
        body: Option<Value>,
    ) -> Result<HttpRequest, ApiError> {
        let ctx = UrlContext {
            base_url: &self.base_url,
            authenticated: self.auth_path_prefix && self.auth.is_some(),
        };
        build_request(ctx, endpoint, params, body)
    }

    /// Apply session defaults to `request` and perform exactly one exchange.
    ///
    /// Any response, whatever its status, is returned; only a failure to
    /// obtain one is an error.
    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let request = self.prepare(request);
        let started = Instant::now();
        match self.transport.execute(&request) {
            Ok(response) => {
                debug!(
                    method = %request.method,
                    url = %request.url,
                    status = response.status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "gerrit request completed"
                );
                Ok(response)
            }
            Err(source) => {
                warn!(
                    method = %request.method,
                    url = %request.url,
                    kind = ?source.kind(),
                    error = %source,
                    "gerrit request failed"
                );
                Err(ApiError::NetworkError { source })
            }
        }
    }

    /// Map the status and decode the body per the endpoint's response shape.
    pub fn parse_response<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        response: HttpResponse,
    ) -> Result<T, ApiError> {
        let response = check_status(response)?;
        envelope::decode(&response, endpoint.response)
    }

    fn prepare(&self, mut request: HttpRequest) -> HttpRequest {
        if request.timeout.is_none() {
            request.timeout = self.timeout;
        }
        let mut defaults: Vec<(String, String)> = Vec::with_capacity(self.headers.len() + 2);
        defaults.push(("user-agent".to_string(), self.user_agent.clone()));
        defaults.extend(self.headers.iter().cloned());
        if let Some(auth) = &self.auth {
            let (name, value) = auth.header();
            defaults.push((name.to_string(), value));
        }
        for (name, value) in defaults {
            if !request.has_header(&name) {
                request.headers.push((name, value));
            }
        }
        request
    }
}

impl fmt::Debug for GerritClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GerritClient")
            .field("base_url", &self.base_url.as_str())
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("auth_path_prefix", &self.auth_path_prefix)
            .finish_non_exhaustive()
    }
}

/// Validate the base URL, force a trailing slash and lift any userinfo into
/// Basic credentials.
fn parse_base_url(raw: &str) -> Result<(Url, Option<Auth>), ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::InvalidRequest("no base URL given".to_string()));
    }
    let mut url = Url::parse(raw).map_err(|e| ApiError::InvalidRequest(format!("invalid base URL `{raw}`: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::InvalidRequest(format!(
            "base URL `{raw}` must use http or https"
        )));
    }

    let auth = if url.username().is_empty() {
        None
    } else {
        let username = decode_userinfo(url.username());
        let password = url.password().map(decode_userinfo).unwrap_or_default();
        Some(Auth::basic(username, password))
    };
    // Only fails for cannot-be-a-base URLs, which http(s) never are.
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_query(None);
    url.set_fragment(None);

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok((url, auth))
}

fn decode_userinfo(raw: &str) -> String {
    percent_encoding::percent_decode_str(raw)
        .decode_utf8_lossy()
        .into_owned()
}
