//! Client core for a Gerrit-style code-review REST API.
//!
//! # Overview
//! Resource facades describe each operation as an [`Endpoint`] and call
//! [`GerritClient::invoke`] with the call's [`Params`] and body. The core
//! builds the request, sends it once through a [`Transport`], maps failure
//! statuses to [`ApiError`] and decodes the body into the caller's type.
//!
//! # Design
//! - `GerritClient` is immutable after construction and `Send + Sync`.
//! - Each stage is usable on its own (`build_request`, `execute`,
//!   `parse_response`), so the I/O boundary stays explicit and every other
//!   stage is testable with plain values.
//! - Service framing (the `)]}'` prefix, quoted scalars, `text/plain`
//!   uploads) lives only in the request builder's body encoding and in
//!   [`envelope`].
//! - No retries: failures are returned as values and retrying is up to the
//!   caller.
//!
//! ```no_run
//! use gerrit_core::{Endpoint, GerritClient, Params};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct SshKeyInfo {
//!     seq: u32,
//!     ssh_public_key: String,
//!     valid: bool,
//! }
//!
//! const ADD_SSH_KEY: Endpoint = Endpoint::post("accounts/{account_id}/sshkeys").with_text_body();
//!
//! # fn main() -> Result<(), gerrit_core::ApiError> {
//! let client = GerritClient::new("https://review.example.com/")?;
//! let params = Params::new().path("account_id", "self");
//! let key: SshKeyInfo = client.invoke(&ADD_SSH_KEY, &params, Some("ssh-ed25519 AAAA... me@example.com".into()))?;
//! println!("stored key #{} (valid: {})", key.seq, key.valid);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod http;
mod request;
pub mod transport;

pub use client::GerritClient;
pub use config::{Auth, ClientConfig};
pub use endpoint::{BodyEncoding, Endpoint, Params, ResponseShape};
pub use error::{ApiError, TransportError, TransportErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
