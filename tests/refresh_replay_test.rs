//! Integration tests for the authenticated request path.
//!
//! These tests verify the credential handling around every API call:
//! - Bearer attach from the shared token store at the moment of use
//! - Transparent refresh-and-replay on 401 (exactly one of each)
//! - Session expiry when the refresh itself fails
//! - The refresh endpoint never re-entering the replay handling
//! - Cookie jar carrying the refresh credential set at login

use std::time::{Duration, Instant};

use deskwire::api::{ApiClient, ApiConfig, ApiError, Method};
use deskwire::auth::{SessionStatus, TokenStore};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

/// Helper to build a client against a mock server with a stored bearer token
fn client_with_token(server: &MockServer, token: &str) -> ApiClient {
    common::init_tracing();
    let tokens = TokenStore::in_memory();
    tokens.set(token);
    ApiClient::new(ApiConfig::new(server.uri()), tokens).unwrap()
}

/// Helper to build a client with an empty token store
fn client_without_token(server: &MockServer) -> ApiClient {
    common::init_tracing();
    ApiClient::new(ApiConfig::new(server.uri()), TokenStore::in_memory()).unwrap()
}

// ============================================================================
// Test 1: 401 triggers one refresh and one replay with the new token
// ============================================================================

#[tokio::test]
async fn test_replays_once_with_new_token_after_refresh() {
    let mock_server = MockServer::start().await;

    // First attempt with the stale token is rejected
    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(header("Authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "Unauthorized"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Refresh hands out a new token
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Replay with the fresh token succeeds
    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "subject": "VPN down"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "stale-token");
    let result = client.get("/tickets").await;

    assert!(result.is_ok(), "expected replay to succeed: {:?}", result.err());
    let tickets: Value = result.unwrap().json().unwrap();
    assert_eq!(tickets[0]["subject"], "VPN down");

    // The store now carries the refreshed credential
    assert_eq!(client.tokens().bearer(), Some("fresh-token".to_string()));
    assert_eq!(client.tokens().current_status(), SessionStatus::Active);
}

// ============================================================================
// Test 2: A second 401 propagates; the refresh is never attempted twice
// ============================================================================

#[tokio::test]
async fn test_second_401_propagates_without_second_refresh() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(header("Authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The server rejects even the fresh token
    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "still unauthorized"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "stale-token");
    let result = client.get("/tickets").await;

    match result {
        Err(ApiError::Status { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected Status 401 after failed replay, got {:?}", other),
    }

    // The refreshed token stays; only a failed refresh ends the session
    assert_eq!(client.tokens().bearer(), Some("fresh-token".to_string()));
}

// ============================================================================
// Test 3: A failed refresh expires the session
// ============================================================================

#[tokio::test]
async fn test_refresh_failure_expires_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tickets"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "refresh cookie invalid"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "stale-token");
    let result = client.get("/tickets").await;

    match result {
        Err(ApiError::SessionExpired(cause)) => {
            assert_eq!(cause.status(), Some(401));
        }
        other => panic!("expected SessionExpired, got {:?}", other),
    }

    // Credential dropped and subscribers told the session died
    assert_eq!(client.tokens().bearer(), None);
    assert_eq!(client.tokens().current_status(), SessionStatus::Expired);
}

// ============================================================================
// Test 4: Non-401 errors pass through untouched, no refresh attempted
// ============================================================================

#[tokio::test]
async fn test_non_401_statuses_pass_through() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tickets/999"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such ticket"))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Refresh must NOT be called for a 404
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "unused"
        })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "good-token");
    let result = client.get("/tickets/999").await;

    match result {
        Err(ApiError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert!(body.contains("no such ticket"));
        }
        other => panic!("expected Status 404, got {:?}", other),
    }

    assert_eq!(client.tokens().bearer(), Some("good-token".to_string()));
}

// ============================================================================
// Test 5: No credential means no Authorization header at all
// ============================================================================

#[tokio::test]
async fn test_no_credential_sends_no_auth_header() {
    let mock_server = MockServer::start().await;

    // Guard mounted first: any request carrying an Authorization header
    // lands here and fails the expectation
    Mock::given(method("GET"))
        .and(path("/announcements"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/announcements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_without_token(&mock_server);
    let result = client.get("/announcements").await;

    assert!(result.is_ok(), "anonymous request failed: {:?}", result.err());
}

// ============================================================================
// Test 6: The bearer is read from the store at the moment of use
// ============================================================================

#[tokio::test]
async fn test_bearer_read_at_moment_of_use() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(header("Authorization", "Bearer rotated-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "original-token");

    // Another part of the app rotates the credential before this call
    client.tokens().set("rotated-token");

    let result = client.get("/tickets").await;
    assert!(result.is_ok(), "expected rotated token: {:?}", result.err());
}

// ============================================================================
// Test 7: Login stores the token and its cookie feeds the refresh
// ============================================================================

#[tokio::test]
async fn test_login_cookie_feeds_refresh() {
    let mock_server = MockServer::start().await;

    // Login answers with the bearer token and sets the refresh cookie
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "email": "agent@desk.test",
            "password": "hunter2"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "refresh=r1; Path=/; HttpOnly")
                .set_body_json(json!({"access_token": "first-token"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(header("Authorization", "Bearer first-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The refresh only succeeds because the jar sends the cookie back
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("cookie", "refresh=r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "second-token"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(header("Authorization", "Bearer second-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_without_token(&mock_server);

    let login = client.login("agent@desk.test", "hunter2").await;
    assert!(login.is_ok(), "login failed: {:?}", login.err());
    assert_eq!(client.tokens().bearer(), Some("first-token".to_string()));

    let result = client.get("/tickets").await;
    assert!(result.is_ok(), "refresh via cookie failed: {:?}", result.err());
    assert_eq!(client.tokens().bearer(), Some("second-token".to_string()));
}

// ============================================================================
// Test 8: Logout clears the store, even when the server errors
// ============================================================================

#[tokio::test]
async fn test_logout_clears_store() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("Authorization", "Bearer good-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "good-token");
    assert!(client.logout().await.is_ok());

    assert_eq!(client.tokens().bearer(), None);
    assert_eq!(client.tokens().current_status(), SessionStatus::SignedOut);
}

#[tokio::test]
async fn test_logout_clears_store_on_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "good-token");
    let result = client.logout().await;

    // The server's failure propagates, but the local session is over
    assert!(result.is_err());
    assert_eq!(client.tokens().bearer(), None);
    assert_eq!(client.tokens().current_status(), SessionStatus::SignedOut);
}

// ============================================================================
// Test 9: The refresh call is bounded by its own deadline
// ============================================================================

#[tokio::test]
async fn test_refresh_timeout_is_bounded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tickets"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    // A refresh endpoint that never answers in time
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(60))
                .set_body_json(json!({"access_token": "too-late"})),
        )
        .mount(&mock_server)
        .await;

    let tokens = TokenStore::in_memory();
    tokens.set("stale-token");
    let config =
        ApiConfig::new(mock_server.uri()).with_refresh_timeout(Duration::from_millis(200));
    let client = ApiClient::new(config, tokens).unwrap();

    let started = Instant::now();
    let result = client.get("/tickets").await;

    assert!(
        matches!(result, Err(ApiError::SessionExpired(_))),
        "expected SessionExpired from timed-out refresh, got {:?}",
        result
    );
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "refresh deadline did not bound the call"
    );
    assert_eq!(client.tokens().current_status(), SessionStatus::Expired);
}

// ============================================================================
// Test 10: The refresh endpoint is exempt from replay handling
// ============================================================================

#[tokio::test]
async fn test_refresh_endpoint_not_replayed_via_generic_path() {
    let mock_server = MockServer::start().await;

    // Exactly one call must arrive, even though it answers 401
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "some-token");
    let result = client.request(Method::POST, "/auth/refresh", None).await;

    match result {
        Err(ApiError::Status { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected plain Status 401, got {:?}", other),
    }
}

// ============================================================================
// Test 11: Network errors propagate without any retry
// ============================================================================

#[tokio::test]
async fn test_network_errors_propagate_without_retry() {
    // Nothing listens here
    let tokens = TokenStore::in_memory();
    tokens.set("good-token");
    let client = ApiClient::new(ApiConfig::new("http://127.0.0.1:9"), tokens).unwrap();

    let result = client.get("/tickets").await;

    match result {
        Err(e @ ApiError::Http(_)) => assert_eq!(e.status(), None),
        other => panic!("expected Http error, got {:?}", other),
    }

    // A transport failure is not a session failure
    assert_eq!(client.tokens().bearer(), Some("good-token".to_string()));
}

// ============================================================================
// Test 12: POST carries the JSON body on both attempts
// ============================================================================

#[tokio::test]
async fn test_post_body_survives_replay() {
    let mock_server = MockServer::start().await;
    let ticket = json!({"subject": "keyboard misses keys", "priority": "low"});

    Mock::given(method("POST"))
        .and(path("/tickets"))
        .and(body_json(ticket.clone()))
        .and(header("Authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The replay must carry the identical body
    Mock::given(method("POST"))
        .and(path("/tickets"))
        .and(body_json(ticket.clone()))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_token(&mock_server, "stale-token");
    let result = client.post("/tickets", &ticket).await;

    assert!(result.is_ok(), "replayed POST failed: {:?}", result.err());
    assert_eq!(result.unwrap().status, 201);
}
