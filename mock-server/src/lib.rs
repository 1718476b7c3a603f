use std::{collections::BTreeMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

/// Prepended to every JSON answer, as the real service does.
pub const MAGIC_PREFIX: &str = ")]}'\n";

/// `Authorization` value accepted under `/a/` for `admin:secret`.
pub const ADMIN_BASIC: &str = "Basic YWRtaW46c2VjcmV0";
/// Bearer token accepted under `/a/`.
pub const ADMIN_TOKEN: &str = "test-token";

pub const SERVER_VERSION: &str = "3.10.1";

/// Account the caller is logged in as; `self` resolves to it.
pub const SELF_ACCOUNT_ID: u32 = 1_000_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshKeyInfo {
    pub seq: u32,
    pub ssh_public_key: String,
    pub encoded_key: String,
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub valid: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountInfo {
    #[serde(rename = "_account_id")]
    pub account_id: u32,
    pub name: String,
    pub email: String,
    pub username: String,
}

#[derive(Deserialize)]
pub struct AccountNameInput {
    pub name: String,
}

#[derive(Deserialize)]
pub struct AccountQuery {
    pub q: Option<String>,
    pub n: Option<usize>,
}

pub struct Store {
    accounts: Vec<AccountInfo>,
    ssh_keys: BTreeMap<u32, SshKeyInfo>,
    next_seq: u32,
}

impl Store {
    fn seeded() -> Self {
        let accounts = vec![
            AccountInfo {
                account_id: SELF_ACCOUNT_ID,
                name: "John Doe".to_string(),
                email: "john.doe@example.com".to_string(),
                username: "jdoe".to_string(),
            },
            AccountInfo {
                account_id: SELF_ACCOUNT_ID + 1,
                name: "Jane Roe".to_string(),
                email: "jane.roe@example.com".to_string(),
                username: "jroe".to_string(),
            },
        ];
        Self {
            accounts,
            ssh_keys: BTreeMap::new(),
            next_seq: 1,
        }
    }

    fn resolve(&self, id: &str) -> Option<&AccountInfo> {
        if id == "self" {
            return self.accounts.iter().find(|a| a.account_id == SELF_ACCOUNT_ID);
        }
        match id.parse::<u32>() {
            Ok(numeric) => self.accounts.iter().find(|a| a.account_id == numeric),
            Err(_) => self.accounts.iter().find(|a| a.username == id),
        }
    }

    fn resolve_mut(&mut self, id: &str) -> Option<&mut AccountInfo> {
        let account_id = self.resolve(id)?.account_id;
        self.accounts.iter_mut().find(|a| a.account_id == account_id)
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::seeded()));
    let api = Router::new()
        .route("/accounts/", get(query_accounts))
        .route("/accounts/{account_id}", get(get_account))
        .route("/accounts/{account_id}/name", get(get_account_name).put(set_account_name))
        .route("/accounts/{account_id}/sshkeys", get(list_ssh_keys).post(add_ssh_key))
        .route("/accounts/{account_id}/sshkeys/{seq}", get(get_ssh_key).delete(delete_ssh_key))
        .route("/config/server/version", get(server_version))
        .route("/debug/sleep/{millis}", get(sleep))
        .route("/debug/blob/{bytes}", get(blob));
    Router::new()
        .merge(api.clone())
        .nest("/a", api.route_layer(middleware::from_fn(require_auth)))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// A JSON answer framed with the anti-XSSI prefix.
fn gerrit_json<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_string(value) {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, "application/json; charset=UTF-8")],
            format!("{MAGIC_PREFIX}{body}"),
        )
            .into_response(),
        Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn text(status: StatusCode, message: impl Into<String>) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")], message.into()).into_response()
}

fn account_not_found(id: &str) -> Response {
    text(StatusCode::NOT_FOUND, format!("Account '{id}' not found"))
}

fn forbidden(message: &str) -> Response {
    (StatusCode::FORBIDDEN, Json(json!({ "message": message }))).into_response()
}

async fn require_auth(request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == ADMIN_BASIC || value == format!("Bearer {ADMIN_TOKEN}"));
    if !authorized {
        return text(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    next.run(request).await
}

async fn query_accounts(State(db): State<Db>, Query(query): Query<AccountQuery>) -> Response {
    let Some(q) = query.q else {
        return text(StatusCode::BAD_REQUEST, "missing query field");
    };
    let needle = q.strip_prefix("name:").unwrap_or(&q).to_lowercase();
    let store = db.read().await;
    let matches: Vec<&AccountInfo> = store
        .accounts
        .iter()
        .filter(|a| {
            a.name.to_lowercase().contains(&needle)
                || a.username.contains(&needle)
                || a.email.contains(&needle)
        })
        .take(query.n.unwrap_or(usize::MAX))
        .collect();
    gerrit_json(StatusCode::OK, &matches)
}

async fn get_account(State(db): State<Db>, Path(account_id): Path<String>) -> Response {
    let store = db.read().await;
    match store.resolve(&account_id) {
        Some(account) => gerrit_json(StatusCode::OK, account),
        None => account_not_found(&account_id),
    }
}

async fn get_account_name(State(db): State<Db>, Path(account_id): Path<String>) -> Response {
    let store = db.read().await;
    match store.resolve(&account_id) {
        Some(account) => gerrit_json(StatusCode::OK, &account.name),
        None => account_not_found(&account_id),
    }
}

async fn set_account_name(
    State(db): State<Db>,
    Path(account_id): Path<String>,
    Json(input): Json<AccountNameInput>,
) -> Response {
    let mut store = db.write().await;
    let Some(account) = store.resolve_mut(&account_id) else {
        return account_not_found(&account_id);
    };
    if account.account_id != SELF_ACCOUNT_ID {
        return forbidden("modify account name not permitted");
    }
    account.name = input.name.trim().to_string();
    gerrit_json(StatusCode::OK, &account.name)
}

async fn list_ssh_keys(State(db): State<Db>, Path(account_id): Path<String>) -> Response {
    let store = db.read().await;
    match store.resolve(&account_id) {
        Some(account) if account.account_id == SELF_ACCOUNT_ID => {
            let keys: Vec<&SshKeyInfo> = store.ssh_keys.values().collect();
            gerrit_json(StatusCode::OK, &keys)
        }
        Some(_) => forbidden("view SSH keys not permitted"),
        None => account_not_found(&account_id),
    }
}

async fn add_ssh_key(
    State(db): State<Db>,
    Path(account_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let mut store = db.write().await;
    match store.resolve(&account_id) {
        Some(account) if account.account_id == SELF_ACCOUNT_ID => {}
        Some(_) => return forbidden("modify SSH keys not permitted"),
        None => return account_not_found(&account_id),
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("text/plain") {
        return text(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("Expected Content-Type 'text/plain', got '{content_type}'"),
        );
    }

    let ssh_public_key = body.trim().to_string();
    let mut parts = ssh_public_key.split_whitespace();
    let (Some(algorithm), Some(encoded_key)) = (parts.next(), parts.next()) else {
        return text(StatusCode::BAD_REQUEST, "Invalid SSH key");
    };
    let comment = parts.collect::<Vec<_>>().join(" ");

    let seq = store.next_seq;
    store.next_seq += 1;
    let info = SshKeyInfo {
        seq,
        algorithm: algorithm.to_string(),
        encoded_key: encoded_key.to_string(),
        comment: (!comment.is_empty()).then_some(comment),
        valid: algorithm.starts_with("ssh-") || algorithm.starts_with("ecdsa-"),
        ssh_public_key,
    };
    debug!(seq, algorithm = %info.algorithm, "stored SSH key");
    store.ssh_keys.insert(seq, info.clone());
    gerrit_json(StatusCode::CREATED, &info)
}

async fn get_ssh_key(State(db): State<Db>, Path((account_id, seq)): Path<(String, u32)>) -> Response {
    let store = db.read().await;
    match store.resolve(&account_id) {
        Some(account) if account.account_id == SELF_ACCOUNT_ID => {}
        Some(_) => return forbidden("view SSH keys not permitted"),
        None => return account_not_found(&account_id),
    }
    match store.ssh_keys.get(&seq) {
        Some(key) => gerrit_json(StatusCode::OK, key),
        None => text(StatusCode::NOT_FOUND, format!("SSH key {seq} not found")),
    }
}

async fn delete_ssh_key(State(db): State<Db>, Path((account_id, seq)): Path<(String, u32)>) -> Response {
    let mut store = db.write().await;
    match store.resolve(&account_id) {
        Some(account) if account.account_id == SELF_ACCOUNT_ID => {}
        Some(_) => return forbidden("modify SSH keys not permitted"),
        None => return account_not_found(&account_id),
    }
    match store.ssh_keys.remove(&seq) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => text(StatusCode::NOT_FOUND, format!("SSH key {seq} not found")),
    }
}

async fn server_version() -> Response {
    gerrit_json(StatusCode::OK, &SERVER_VERSION)
}

async fn sleep(Path(millis): Path<u64>) -> Response {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    gerrit_json(StatusCode::OK, &"awake")
}

/// A quoted scalar of `bytes` characters, for exercising large bodies.
async fn blob(Path(bytes): Path<usize>) -> Response {
    gerrit_json(StatusCode::OK, &"x".repeat(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_key_info_serializes_without_empty_comment() {
        let info = SshKeyInfo {
            seq: 1,
            ssh_public_key: "ssh-ed25519 AAAA".to_string(),
            encoded_key: "AAAA".to_string(),
            algorithm: "ssh-ed25519".to_string(),
            comment: None,
            valid: true,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["seq"], 1);
        assert!(json.get("comment").is_none());
    }

    #[test]
    fn account_info_uses_service_field_names() {
        let store = Store::seeded();
        let account = store.resolve("self").unwrap();
        let json = serde_json::to_value(account).unwrap();
        assert_eq!(json["_account_id"], SELF_ACCOUNT_ID);
        assert_eq!(json["username"], "jdoe");
    }

    #[test]
    fn accounts_resolve_by_self_id_and_username() {
        let store = Store::seeded();
        assert_eq!(store.resolve("self").unwrap().username, "jdoe");
        assert_eq!(store.resolve("1000001").unwrap().username, "jroe");
        assert_eq!(store.resolve("jroe").unwrap().account_id, SELF_ACCOUNT_ID + 1);
        assert!(store.resolve("nobody").is_none());
        assert!(store.resolve("42").is_none());
    }

    #[test]
    fn name_input_requires_name() {
        let result: Result<AccountNameInput, _> = serde_json::from_str(r#"{}"#);
        assert!(result.is_err());
    }
}
