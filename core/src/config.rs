//! Session configuration and credentials.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use serde::Deserialize;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Configuration for a `GerritClient`.
///
/// Deserializable so it can be embedded in an application's own config
/// file; everything except `base_url` has a default.
///
/// ```
/// use gerrit_core::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(r#"{
///     "base_url": "https://review.example.com/",
///     "auth": { "type": "basic", "username": "john", "password": "secret" },
///     "timeout_ms": 5000
/// }"#).unwrap();
/// assert!(config.auth.is_some());
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Root of the REST API, e.g. `https://review.example.com/`. Credentials
    /// in the userinfo part become Basic auth when `auth` is not set.
    pub base_url: String,
    #[serde(default)]
    pub auth: Option<Auth>,
    /// Per-call timeout in milliseconds; `0` disables it.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Headers added to every request unless the request sets them itself.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Prefix paths with `a/` when credentials are configured.
    #[serde(default = "default_true")]
    pub auth_path_prefix: bool,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_user_agent() -> String {
    concat!("gerrit-core/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_true() -> bool {
    true
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: default_user_agent(),
            headers: BTreeMap::new(),
            auth_path_prefix: true,
        }
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        // Rounded up; 0 means disabled.
        self.timeout_ms = u64::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout_ms = 0;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_auth_path_prefix(mut self, enabled: bool) -> Self {
        self.auth_path_prefix = enabled;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Credentials injected into every request.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Auth {
    /// HTTP Basic with the user's HTTP password.
    Basic { username: String, password: String },
    /// `Authorization: Bearer` access token.
    Bearer { token: String },
    /// A session cookie, such as `GerritAccount`.
    Cookie { name: String, value: String },
}

impl Auth {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Auth::Bearer { token: token.into() }
    }

    pub fn cookie(name: impl Into<String>, value: impl Into<String>) -> Self {
        Auth::Cookie {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Header name and value carrying these credentials.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Auth::Basic { username, password } => {
                let encoded = BASE64_STANDARD.encode(format!("{username}:{password}"));
                ("authorization", format!("Basic {encoded}"))
            }
            Auth::Bearer { token } => ("authorization", format!("Bearer {token}")),
            Auth::Cookie { name, value } => ("cookie", format!("{name}={value}")),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Auth::Bearer { .. } => f.debug_struct("Bearer").field("token", &"<redacted>").finish(),
            Auth::Cookie { name, .. } => f
                .debug_struct("Cookie")
                .field("name", name)
                .field("value", &"<redacted>")
                .finish(),
        }
    }
}
