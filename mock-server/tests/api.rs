use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, AccountInfo, SshKeyInfo, ADMIN_BASIC, MAGIC_PREFIX, SELF_ACCOUNT_ID};
use tower::ServiceExt;

const KEY: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAABIwAAAQEA0T...YImydZAw== john.doe@example.com";

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

/// Strip the anti-XSSI prefix and parse the rest.
async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = body_bytes(response).await;
    let payload = bytes
        .strip_prefix(MAGIC_PREFIX.as_bytes())
        .expect("JSON answers carry the magic prefix");
    serde_json::from_slice(payload).unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn text_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "text/plain")
        .body(body.to_string())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- ssh keys ---

#[tokio::test]
async fn add_ssh_key_returns_201() {
    let resp = app()
        .oneshot(text_request("POST", "/accounts/self/sshkeys", KEY))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let info: SshKeyInfo = body_json(resp).await;
    assert_eq!(info.seq, 1);
    assert_eq!(info.ssh_public_key, KEY);
    assert_eq!(info.algorithm, "ssh-rsa");
    assert_eq!(info.comment.as_deref(), Some("john.doe@example.com"));
    assert!(info.valid);
}

#[tokio::test]
async fn add_ssh_key_requires_text_plain() {
    let resp = app()
        .oneshot(json_request("POST", "/accounts/self/sshkeys", &format!("\"{KEY}\"")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn add_ssh_key_rejects_garbage() {
    let resp = app()
        .oneshot(text_request("POST", "/accounts/self/sshkeys", "not-a-key"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn add_ssh_key_for_other_account_is_forbidden() {
    let resp = app()
        .oneshot(text_request("POST", "/accounts/jroe/sshkeys", KEY))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body["message"], "modify SSH keys not permitted");
}

#[tokio::test]
async fn delete_unknown_ssh_key_returns_404() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/accounts/self/sshkeys/99")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ssh_keys_of_other_accounts_are_forbidden() {
    use tower::Service;

    let mut app = app().into_service();
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(text_request("POST", "/accounts/self/sshkeys", KEY))
        .await
        .unwrap();
    let created: SshKeyInfo = body_json(resp).await;
    let uri = format!("/accounts/jroe/sshkeys/{}", created.seq);

    let resp = ServiceExt::ready(&mut app).await.unwrap().call(get(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(Request::builder().method("DELETE").uri(&uri).body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // The owner still has it.
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get(&format!("/accounts/self/sshkeys/{}", created.seq)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn blob_is_a_quoted_scalar_of_the_requested_size() {
    let resp = app().oneshot(get("/debug/blob/5")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let blob: String = body_json(resp).await;
    assert_eq!(blob, "xxxxx");
}

// --- accounts ---

#[tokio::test]
async fn get_account_by_username() {
    let resp = app().oneshot(get("/accounts/jdoe")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let account: AccountInfo = body_json(resp).await;
    assert_eq!(account.account_id, SELF_ACCOUNT_ID);
    assert_eq!(account.email, "john.doe@example.com");
}

#[tokio::test]
async fn unknown_account_returns_404_text() {
    let resp = app().oneshot(get("/accounts/nobody")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_bytes(resp).await;
    assert_eq!(&body[..], b"Account 'nobody' not found");
}

#[tokio::test]
async fn account_name_is_a_quoted_scalar() {
    let resp = app().oneshot(get("/accounts/self/name")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_bytes(resp).await;
    assert_eq!(&body[..], b")]}'\n\"John Doe\"");
}

#[tokio::test]
async fn query_accounts_honours_limit() {
    let resp = app().oneshot(get("/accounts/?q=name:e&n=1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let accounts: Vec<AccountInfo> = body_json(resp).await;
    assert_eq!(accounts.len(), 1);

    let resp = app().oneshot(get("/accounts/?q=roe")).await.unwrap();
    let accounts: Vec<AccountInfo> = body_json(resp).await;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].username, "jroe");
}

#[tokio::test]
async fn query_accounts_without_q_is_bad_request() {
    let resp = app().oneshot(get("/accounts/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- authentication ---

#[tokio::test]
async fn authenticated_prefix_requires_credentials() {
    let resp = app().oneshot(get("/a/config/server/version")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/a/config/server/version")
                .header(http::header::AUTHORIZATION, ADMIN_BASIC)
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let version: String = body_json(resp).await;
    assert_eq!(version, mock_server::SERVER_VERSION);
}

// --- full key lifecycle ---

#[tokio::test]
async fn ssh_key_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // add
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(text_request("POST", "/accounts/self/sshkeys", KEY))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: SshKeyInfo = body_json(resp).await;
    let seq = created.seq;

    // list should contain the one key
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/accounts/self/sshkeys"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let keys: Vec<SshKeyInfo> = body_json(resp).await;
    assert_eq!(keys, vec![created.clone()]);

    // get
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get(&format!("/accounts/self/sshkeys/{seq}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: SshKeyInfo = body_json(resp).await;
    assert_eq!(fetched, created);

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            Request::builder()
                .method("DELETE")
                .uri(&format!("/accounts/self/sshkeys/{seq}"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let body = body_bytes(resp).await;
    assert!(body.is_empty());

    // list after delete is empty
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/accounts/self/sshkeys"))
        .await
        .unwrap();
    let keys: Vec<SshKeyInfo> = body_json(resp).await;
    assert!(keys.is_empty());
}
