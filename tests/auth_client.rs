use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use epay::api::User;
use epay::credentials::{Credential, CredentialStore, InMemoryCredentialStore, StoreError};
use epay::http::{ApiError, ApiRequest, AuthenticatedHttpClient, RefreshError};
use futures::future::join_all;
use reqwest::StatusCode;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WALLET_PATH: &str = "/api/v1/wallet/me";
const REFRESH_PATH: &str = "/api/v1/auth/refresh-token";

fn store_with(access: &str, refresh: &str) -> Arc<InMemoryCredentialStore> {
    Arc::new(InMemoryCredentialStore::with_credential(Credential {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
    }))
}

fn client_for<S: CredentialStore + 'static>(server: &MockServer, store: Arc<S>) -> AuthenticatedHttpClient {
    let base_url = Url::parse(&format!("{}/api/v1", server.uri())).unwrap();
    AuthenticatedHttpClient::new(base_url, store).unwrap()
}

fn wallet_body() -> serde_json::Value {
    json!({ "success": true, "message": "Wallet retrieved", "data": { "balance": 1200 } })
}

async fn refresh_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == REFRESH_PATH)
        .count()
}

#[tokio::test]
async fn stored_token_is_sent_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wallet_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, store_with("abc", "r1"));
    let body = client.send(ApiRequest::get("/wallet/me")).await.unwrap();

    assert_eq!(serde_json::from_slice::<serde_json::Value>(&body).unwrap(), wallet_body());
    let requests = server.received_requests().await.unwrap();
    let auth = requests[0].headers.get("Authorization").unwrap().to_str().unwrap();
    assert_eq!(auth, "abc");
    assert!(!auth.starts_with("Bearer"));
    assert_eq!(
        requests[0].headers.get("Content-Type").unwrap().to_str().unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn request_goes_out_without_a_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(InMemoryCredentialStore::new()));
    let request = ApiRequest::post("/auth/login")
        .json(&json!({ "email": "rahim@example.com", "password": "secret1" }))
        .unwrap();
    client.send(request).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("Authorization").is_none());
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_replayed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "abc"))
        .respond_with(ResponseTemplate::new(401).set_body_string("jwt expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({ "refreshToken": "r1" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": { "accessToken": "xyz" } })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wallet_body()))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("abc", "r1");
    let client = client_for(&server, Arc::clone(&store));
    let wallet: serde_json::Value = client.get_json("/wallet/me").await.unwrap();

    assert_eq!(wallet, wallet_body());
    assert_eq!(store.access_token().await.unwrap().as_deref(), Some("xyz"));
    // No refresh token in the response: the old one stays.
    assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("r1"));
}

#[tokio::test]
async fn rotated_refresh_token_is_stored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "abc"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "accessToken": "xyz", "refreshToken": "r2" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wallet_body()))
        .mount(&server)
        .await;

    let store = store_with("abc", "r1");
    let client = client_for(&server, Arc::clone(&store));
    client.send(ApiRequest::get("/wallet/me")).await.unwrap();

    assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("r2"));
}

#[tokio::test]
async fn empty_refresh_token_in_response_does_not_overwrite() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "abc"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "accessToken": "xyz", "refreshToken": "" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wallet_body()))
        .mount(&server)
        .await;

    let store = store_with("abc", "r1");
    let client = client_for(&server, Arc::clone(&store));
    client.send(ApiRequest::get("/wallet/me")).await.unwrap();

    assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("r1"));
}

#[tokio::test]
async fn rejected_refresh_clears_store_and_reports_refresh_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("refresh token revoked"))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("abc", "r1");
    let client = client_for(&server, Arc::clone(&store));
    let err = client.send(ApiRequest::get("/wallet/me")).await.unwrap_err();

    match &err {
        ApiError::RefreshFailed(RefreshError::Rejected { status, body }) => {
            assert_eq!(*status, StatusCode::FORBIDDEN);
            assert_eq!(body, "refresh token revoked");
        },
        other => panic!("expected a refresh failure, got {other:?}"),
    }
    assert!(err.requires_login());
    assert!(store.access_token().await.unwrap().is_none());
    assert!(store.refresh_token().await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_refresh_response_is_a_refresh_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let store = store_with("abc", "r1");
    let client = client_for(&server, Arc::clone(&store));
    let err = client.send(ApiRequest::get("/wallet/me")).await.unwrap_err();

    assert!(matches!(err, ApiError::RefreshFailed(RefreshError::MalformedResponse(_))));
    assert!(store.access_token().await.unwrap().is_none());
}

#[tokio::test]
async fn replay_rejected_again_is_not_refreshed_twice() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("still unauthorized"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "accessToken": "xyz" } })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("abc", "r1");
    let client = client_for(&server, Arc::clone(&store));
    let err = client.send(ApiRequest::get("/wallet/me")).await.unwrap_err();

    match err {
        ApiError::Http { status, body } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, "still unauthorized");
        },
        other => panic!("expected the replay's 401, got {other:?}"),
    }
    assert_eq!(refresh_calls(&server).await, 1);
    // The refresh itself succeeded, so the session is kept.
    assert_eq!(store.access_token().await.unwrap().as_deref(), Some("xyz"));
}

#[tokio::test]
async fn missing_refresh_token_propagates_original_401() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("jwt expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryCredentialStore::new());
    store.save_access_token("abc").await.unwrap();
    let client = client_for(&server, Arc::clone(&store));
    let err = client.send(ApiRequest::get("/wallet/me")).await.unwrap_err();

    assert!(matches!(err, ApiError::Http { status: StatusCode::UNAUTHORIZED, .. }));
    assert!(!err.requires_login());
    assert_eq!(store.access_token().await.unwrap().as_deref(), Some("abc"));
}

#[tokio::test]
async fn other_failures_pass_through_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/wallet/send-money"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"success":false,"message":"Insufficient balance"}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, store_with("abc", "r1"));
    let request = ApiRequest::post("/wallet/send-money")
        .json(&json!({ "receiverEmail": "karim@example.com", "amount": 1_000_000 }))
        .unwrap();
    let err = client.send(request).await.unwrap_err();

    match err {
        ApiError::Http { status, body } => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body.contains("Insufficient balance"));
        },
        other => panic!("expected a server rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let base_url = Url::parse("http://127.0.0.1:1/api/v1").unwrap();
    let client = AuthenticatedHttpClient::new(base_url, store_with("abc", "r1")).unwrap();

    let err = client.send(ApiRequest::get("/wallet/me")).await.unwrap_err();

    assert!(matches!(err, ApiError::Network(_)));
}

#[tokio::test]
async fn slow_response_hits_the_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let base_url = Url::parse(&format!("{}/api/v1", server.uri())).unwrap();
    let client = AuthenticatedHttpClient::with_config(
        base_url,
        Duration::from_millis(100),
        "/auth/refresh-token",
        store_with("abc", "r1"),
    )
    .unwrap();

    let err = client.send(ApiRequest::get("/wallet/me")).await.unwrap_err();

    match err {
        ApiError::Network(e) => assert!(e.is_timeout()),
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "abc"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "accessToken": "xyz" } }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wallet_body()))
        .expect(5)
        .mount(&server)
        .await;

    let client = Arc::new(client_for(&server, store_with("abc", "r1")));
    let calls = (0..5).map(|_| {
        let client = Arc::clone(&client);
        async move { client.send(ApiRequest::get("/wallet/me")).await }
    });

    for result in join_all(calls).await {
        assert!(result.is_ok(), "request failed: {:?}", result.err());
    }
    assert_eq!(refresh_calls(&server).await, 1);
}

#[tokio::test]
async fn concurrent_401s_all_see_the_refresh_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("abc", "r1");
    let client = Arc::new(client_for(&server, Arc::clone(&store)));
    let calls = (0..3).map(|_| {
        let client = Arc::clone(&client);
        async move { client.send(ApiRequest::get("/wallet/me")).await }
    });

    for result in join_all(calls).await {
        assert!(matches!(result, Err(ApiError::RefreshFailed(_))));
    }
    assert!(store.refresh_token().await.unwrap().is_none());
}

#[tokio::test]
async fn query_parameters_are_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/transaction/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": [] })))
        .mount(&server)
        .await;

    let client = client_for(&server, store_with("abc", "r1"));
    client
        .send(ApiRequest::get("/transaction/me").query("type", "SEND MONEY").query("page", "2"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("type=SEND+MONEY&page=2"));
}

async fn refresh_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == REFRESH_PATH)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn refresh_outlives_a_cancelled_caller() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "abc"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "accessToken": "xyz", "refreshToken": "r2" } }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wallet_body()))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("abc", "r1");
    let client = client_for(&server, store.clone());

    let cancelled = tokio::time::timeout(Duration::from_millis(100), client.send(ApiRequest::get("/wallet/me"))).await;
    assert!(cancelled.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(store.access_token().await.unwrap().as_deref(), Some("xyz"));
    assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("r2"));

    // The slot was released: the next request goes straight out with the new token.
    client.send(ApiRequest::get("/wallet/me")).await.unwrap();
    assert_eq!(refresh_calls(&server).await, 1);
}

#[tokio::test]
async fn new_session_is_not_tied_to_an_abandoned_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "abc"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "new"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({ "refreshToken": "r1" })))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("old refresh token revoked")
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({ "refreshToken": "r9" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "accessToken": "fresh" } })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wallet_body()))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("abc", "r1");
    let client = client_for(&server, store.clone());

    let cancelled = tokio::time::timeout(Duration::from_millis(100), client.send(ApiRequest::get("/wallet/me"))).await;
    assert!(cancelled.is_err());

    // Signed in again while the old refresh is still on the wire.
    store
        .save_credential(&Credential {
            access_token: "new".to_string(),
            refresh_token: "r9".to_string(),
        })
        .await
        .unwrap();

    client.send(ApiRequest::get("/wallet/me")).await.unwrap();

    assert_eq!(
        refresh_bodies(&server).await,
        vec![json!({ "refreshToken": "r1" }), json!({ "refreshToken": "r9" })]
    );
    assert_eq!(store.access_token().await.unwrap().as_deref(), Some("fresh"));
    assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("r9"));
}

/// Serves a stale access token on the first read, as if another request's
/// refresh completed between sending and receiving the 401.
struct RotatedMidFlightStore {
    inner: InMemoryCredentialStore,
    stale_access: String,
    served_stale: AtomicBool,
}

#[async_trait]
impl CredentialStore for RotatedMidFlightStore {
    async fn access_token(&self) -> Result<Option<String>, StoreError> {
        if !self.served_stale.swap(true, Ordering::SeqCst) {
            return Ok(Some(self.stale_access.clone()));
        }
        self.inner.access_token().await
    }

    async fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.inner.refresh_token().await
    }

    async fn save_access_token(&self, token: &str) -> Result<(), StoreError> {
        self.inner.save_access_token(token).await
    }

    async fn save_refresh_token(&self, token: &str) -> Result<(), StoreError> {
        self.inner.save_refresh_token(token).await
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.save_user(user).await
    }

    async fn user(&self) -> Result<Option<User>, StoreError> {
        self.inner.user().await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.inner.clear_all().await
    }
}

#[tokio::test]
async fn late_401_replays_with_already_rotated_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "abc"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(WALLET_PATH))
        .and(header("Authorization", "xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wallet_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(RotatedMidFlightStore {
        inner: InMemoryCredentialStore::with_credential(Credential {
            access_token: "xyz".to_string(),
            refresh_token: "r2".to_string(),
        }),
        stale_access: "abc".to_string(),
        served_stale: AtomicBool::new(false),
    });
    let client = client_for(&server, store.clone());

    let body = client.send(ApiRequest::get("/wallet/me")).await.unwrap();

    assert_eq!(serde_json::from_slice::<serde_json::Value>(&body).unwrap(), wallet_body());
    assert_eq!(refresh_calls(&server).await, 0);
    assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("r2"));
}
