/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for kassensichv-client tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use kassensichv_client::{ClientConfig, Credentials, KassensichvClient, MockTransactionSigner};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "test-api-key";
pub const API_SECRET: &str = "test-api-secret";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Base URL pointing the client at the mock server
pub fn base_url(server: &MockServer) -> String {
    format!("{}/api/v0", server.uri())
}

/// Client with diagnostics enabled plus a handle on its mock signer
pub fn test_client(server: &MockServer) -> (KassensichvClient, MockTransactionSigner) {
    let signer = MockTransactionSigner::new();
    let config = ClientConfig::default()
        .with_base_url(base_url(server))
        .with_diagnostics(true);
    let client = KassensichvClient::with_config(
        Arc::new(signer.clone()),
        Credentials::new(API_KEY, API_SECRET),
        config,
    )
    .expect("client init");
    (client, signer)
}

/// Body returned by the auth endpoint
pub fn token_body(access_token: &str, refresh_token: &str, expires_in: u64) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "access_token_expires_in": expires_in / 10,
        "refresh_token": refresh_token,
        "refresh_token_expires_in": expires_in,
    })
}

/// Mock for `POST /auth` with the API key pair
pub fn api_key_auth(access_token: &str, expires_in: u64) -> Mock {
    Mock::given(method("POST"))
        .and(path("/api/v0/auth"))
        .and(body_json(serde_json::json!({
            "api_key": API_KEY,
            "api_secret": API_SECRET,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            access_token,
            &format!("{access_token}-refresh"),
            expires_in,
        )))
}

/// Mock for `POST /auth` with a refresh token
pub fn refresh_token_auth(refresh_token: &str, response: ResponseTemplate) -> Mock {
    Mock::given(method("POST"))
        .and(path("/api/v0/auth"))
        .and(body_json(serde_json::json!({
            "refresh_token": refresh_token,
        })))
        .respond_with(response)
}

/// Number of requests the server saw whose body carried a refresh token
pub async fn refresh_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| {
            serde_json::from_slice::<serde_json::Value>(&request.body)
                .map(|body| body.get("refresh_token").is_some())
                .unwrap_or(false)
        })
        .count()
}

/// Poll until the server saw at least `min` refresh calls or `deadline` passes
pub async fn wait_for_refresh_calls(server: &MockServer, min: usize, deadline: Duration) -> usize {
    let started = tokio::time::Instant::now();
    loop {
        let calls = refresh_calls(server).await;
        if calls >= min || started.elapsed() >= deadline {
            return calls;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
