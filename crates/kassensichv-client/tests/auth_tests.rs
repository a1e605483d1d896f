/*
[INPUT]:  Mock auth endpoint and resource responses
[OUTPUT]: Test results for the authentication lifecycle
[POS]:    Integration tests - authentication
[UPDATE]: When auth flow, refresh or retry rules change
*/

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    api_key_auth, base_url, refresh_calls, refresh_token_auth, setup_mock_server, test_client,
    token_body, wait_for_refresh_calls, API_KEY, API_SECRET,
};
use futures_util::future::join_all;
use kassensichv_client::auth::AuthManager;
use kassensichv_client::http::{BaseLayer, ReqwestTransport};
use kassensichv_client::{ClientConfig, Credentials, KassensichvError, Request, StatusCode};
use tokio_test::assert_ok;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_list(token: &str, status: u16) -> Mock {
    Mock::given(method("GET"))
        .and(path("/api/v0/client"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "_type": "CLIENT_LIST",
            "data": [],
        })))
}

fn auth_manager(server: &MockServer) -> AuthManager {
    let config = ClientConfig::default().with_base_url(base_url(server));
    let base = assert_ok!(BaseLayer::new(&config));
    let transport = Arc::new(assert_ok!(ReqwestTransport::new(&config)));
    assert_ok!(AuthManager::new(
        Credentials::new(API_KEY, API_SECRET),
        base,
        transport
    ))
}

#[tokio::test]
async fn test_first_request_authenticates_exactly_once() {
    let server = setup_mock_server().await;
    api_key_auth("at1", 86_400).expect(1).mount(&server).await;
    client_list("at1", 200).expect(3).mount(&server).await;

    let (client, _) = test_client(&server);
    for _ in 0..3 {
        let response = assert_ok!(client.request(Request::get("/client")).await);
        let body: serde_json::Value = assert_ok!(response.json());
        assert_eq!(body["_type"], "CLIENT_LIST");
    }

    let diagnostics = client.diagnostics().expect("diagnostics enabled");
    assert_eq!(diagnostics.auth_calls(), 1);
    let snapshot = diagnostics.auth_snapshot();
    assert_eq!(snapshot.access_token.as_deref(), Some("at1"));
    assert_eq!(snapshot.refresh_token.as_deref(), Some("at1-refresh"));
    assert_eq!(
        snapshot.refresh_interval,
        Some(Duration::from_millis(86_400 * 1000 / 10))
    );
    assert!(snapshot.refresh_armed);
}

#[tokio::test]
async fn test_unauthorized_response_reauthenticates_and_retries_once() {
    let server = setup_mock_server().await;
    api_key_auth("at1", 86_400)
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    api_key_auth("at2", 86_400).expect(1).mount(&server).await;
    client_list("at1", 401).expect(1).mount(&server).await;
    client_list("at2", 200).expect(1).mount(&server).await;

    let (client, _) = test_client(&server);
    let response = assert_ok!(client.request(Request::get("/client")).await);
    assert_eq!(response.status, StatusCode::OK);

    let diagnostics = client.diagnostics().expect("diagnostics enabled");
    assert!(diagnostics.auth_calls() >= 2);

    let requests = server.received_requests().await.expect("recording enabled");
    let bearers: Vec<String> = requests
        .iter()
        .filter(|request| request.url.path() == "/api/v0/client")
        .filter_map(|request| request.headers.get("authorization"))
        .map(|value| value.to_str().unwrap().to_string())
        .collect();
    assert_eq!(bearers, vec!["Bearer at1", "Bearer at2"]);
}

#[tokio::test]
async fn test_malformed_jwt_response_is_treated_like_unauthorized() {
    let server = setup_mock_server().await;
    api_key_auth("at1", 86_400)
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    api_key_auth("at2", 86_400).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v0/client"))
        .and(header("authorization", "Bearer at1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "message": "could not parse jwt",
        })))
        .expect(1)
        .mount(&server)
        .await;
    client_list("at2", 200).expect(1).mount(&server).await;

    let (client, _) = test_client(&server);
    assert_ok!(client.request(Request::get("/client")).await);
}

#[tokio::test]
async fn test_persistent_unauthorized_does_not_loop() {
    let server = setup_mock_server().await;
    api_key_auth("at1", 86_400).expect(2).mount(&server).await;
    client_list("at1", 401).expect(2).mount(&server).await;

    let (client, _) = test_client(&server);
    let err = client.request(Request::get("/client")).await.unwrap_err();
    match err {
        KassensichvError::Http { status, .. } => assert_eq!(status, StatusCode::UNAUTHORIZED),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let server = setup_mock_server().await;
    api_key_auth("at1", 86_400).expect(1).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v0/tss/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("TSS not found"))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = test_client(&server);
    let err = client
        .request(Request::get("/tss/missing"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn test_rejected_credentials_surface_auth_error() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/auth"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = test_client(&server);
    let err = client.request(Request::get("/client")).await.unwrap_err();
    assert!(err.is_auth_error());
    assert!(matches!(err, KassensichvError::Authentication { .. }));
}

#[tokio::test]
async fn test_repairs_broken_access_tokens() {
    let server = setup_mock_server().await;
    api_key_auth("at1", 86_400).mount(&server).await;
    client_list("at1", 200).expect(3).mount(&server).await;
    // Any other bearer token is rejected
    Mock::given(method("GET"))
        .and(path("/api/v0/client"))
        .respond_with(ResponseTemplate::new(401))
        .with_priority(10)
        .expect(2)
        .mount(&server)
        .await;

    let (client, _) = test_client(&server);
    let diagnostics = client.diagnostics().expect("diagnostics enabled");

    for token in [Some("invalid"), Some(""), None] {
        diagnostics.set_access_token(token.map(str::to_string));
        assert_ok!(client.request(Request::get("/client")).await);
        assert_eq!(diagnostics.auth_snapshot().access_token.as_deref(), Some("at1"));
    }
}

#[tokio::test]
async fn test_concurrent_first_requests_share_one_authentication() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/auth"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("at1", "rt1", 86_400))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    client_list("at1", 200).expect(8).mount(&server).await;

    let (client, _) = test_client(&server);
    let requests = (0..8).map(|_| client.request(Request::get("/client")));
    for result in join_all(requests).await {
        assert_ok!(result);
    }

    let diagnostics = client.diagnostics().expect("diagnostics enabled");
    assert_eq!(diagnostics.auth_calls(), 1);
}

#[tokio::test]
async fn test_background_refresh_uses_refresh_token() {
    let server = setup_mock_server().await;
    // 2s refresh token lifetime -> refresh every 200ms
    api_key_auth("at1", 2).expect(1).mount(&server).await;
    refresh_token_auth(
        "at1-refresh",
        ResponseTemplate::new(200).set_body_json(token_body("at2", "at1-refresh", 2)),
    )
    .mount(&server)
    .await;
    client_list("at1", 200).mount(&server).await;
    client_list("at2", 200).mount(&server).await;

    let (client, _) = test_client(&server);
    assert_ok!(client.request(Request::get("/client")).await);

    let refreshes = wait_for_refresh_calls(&server, 2, Duration::from_secs(5)).await;
    assert!(refreshes >= 2, "refreshes: {refreshes}");
    let diagnostics = client.diagnostics().expect("diagnostics enabled");
    let snapshot = diagnostics.auth_snapshot();
    assert_eq!(snapshot.access_token.as_deref(), Some("at2"));
    assert_eq!(snapshot.refresh_interval, Some(Duration::from_millis(200)));
    assert!(snapshot.refresh_armed);
    assert!(snapshot.refreshed_at.is_some());

    assert_ok!(client.request(Request::get("/client")).await);
}

#[tokio::test]
async fn test_refresh_failures_keep_current_token() {
    let server = setup_mock_server().await;
    api_key_auth("at1", 2).expect(1).mount(&server).await;
    refresh_token_auth("at1-refresh", ResponseTemplate::new(500))
        .mount(&server)
        .await;
    client_list("at1", 200).expect(2).mount(&server).await;

    let (client, _) = test_client(&server);
    assert_ok!(client.request(Request::get("/client")).await);

    let refreshes = wait_for_refresh_calls(&server, 1, Duration::from_secs(5)).await;
    assert!(refreshes >= 1, "refreshes: {refreshes}");
    let diagnostics = client.diagnostics().expect("diagnostics enabled");
    let snapshot = diagnostics.auth_snapshot();
    assert_eq!(snapshot.access_token.as_deref(), Some("at1"));
    assert!(snapshot.refresh_armed, "refresh task survives failures");

    assert_ok!(client.request(Request::get("/client")).await);
}

#[tokio::test]
async fn test_reauthentication_keeps_a_single_refresh_task() {
    let server = setup_mock_server().await;
    api_key_auth("at1", 2).expect(3).mount(&server).await;
    refresh_token_auth(
        "at1-refresh",
        ResponseTemplate::new(200).set_body_json(token_body("at1", "at1-refresh", 2)),
    )
    .mount(&server)
    .await;

    let manager = auth_manager(&server);
    for _ in 0..3 {
        assert_ok!(manager.authenticate().await);
    }

    let first = wait_for_refresh_calls(&server, 1, Duration::from_secs(5)).await;
    assert!(first >= 1, "refresh task never fired");

    // One 200ms task fires at most 6 times per second; three would fire ~15.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let fired = refresh_calls(&server).await - first;
    assert!(fired <= 6, "refreshes in one second: {fired}");
    assert!(manager.snapshot().refresh_armed);
}

#[tokio::test]
async fn test_dropping_manager_stops_refresh() {
    let server = setup_mock_server().await;
    api_key_auth("at1", 2).expect(1).mount(&server).await;
    refresh_token_auth(
        "at1-refresh",
        ResponseTemplate::new(200).set_body_json(token_body("at1", "at1-refresh", 2)),
    )
    .mount(&server)
    .await;

    let manager = auth_manager(&server);
    assert_ok!(manager.authenticate().await);
    drop(manager);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(refresh_calls(&server).await, 0);
}

#[tokio::test]
async fn test_shutdown_stops_refresh_and_rejects_requests() {
    let server = setup_mock_server().await;
    api_key_auth("at1", 2).expect(1).mount(&server).await;
    client_list("at1", 200).expect(1).mount(&server).await;

    let (client, _) = test_client(&server);
    assert_ok!(client.request(Request::get("/client")).await);

    client.shutdown();
    let diagnostics = client.diagnostics().expect("diagnostics enabled");
    assert!(!diagnostics.auth_snapshot().refresh_armed);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(refresh_calls(&server).await, 0);

    let err = client.request(Request::get("/client")).await.unwrap_err();
    assert!(matches!(err, KassensichvError::Closed));
}

#[tokio::test]
async fn test_shutdown_during_authentication_leaves_no_refresh_task() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/auth"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("at1", "at1-refresh", 2))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    client_list("at1", 200).expect(0).mount(&server).await;

    let (client, _) = test_client(&server);
    let in_flight = {
        let client = client.clone();
        tokio::spawn(async move { client.request(Request::get("/client")).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    client.shutdown();

    let result = assert_ok!(in_flight.await);
    assert!(matches!(result, Err(KassensichvError::Closed)));

    // Long enough for several 200ms refresh periods
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(refresh_calls(&server).await, 0);

    let diagnostics = client.diagnostics().expect("diagnostics enabled");
    let snapshot = diagnostics.auth_snapshot();
    assert!(!snapshot.refresh_armed);
    assert!(snapshot.access_token.is_none());
}
