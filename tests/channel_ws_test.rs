//! End-to-end tests for the channel over a real WebSocket server.
//!
//! These run the production transport against an in-process axum server:
//! the handshake with the token query parameter, envelope delivery both
//! ways, and recovery after the server drops a live connection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use deskwire::auth::TokenStore;
use deskwire::channel::{ChannelClient, ChannelConfig, ChannelState, EventEnvelope};
use serde_json::json;
use tokio::time::timeout;

mod common;

#[derive(Clone)]
struct ServerState {
    connections: Arc<AtomicUsize>,
    drop_first: bool,
}

async fn ws_handler(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = params.get("token").cloned().unwrap_or_default();
    let connection = state.connections.fetch_add(1, Ordering::SeqCst);
    let drop_this = state.drop_first && connection == 0;
    ws.on_upgrade(move |socket| async move {
        if drop_this {
            // Dropping the upgraded socket closes it under the client
            return;
        }
        serve_channel(socket, token).await;
    })
}

/// Greet with a hello envelope carrying the token we saw, then echo
/// every text frame back unchanged.
async fn serve_channel(mut socket: WebSocket, token: String) {
    let hello = json!({
        "type": "hello",
        "data": {"token": token},
        "timestamp": chrono::Utc::now()
    });
    if socket.send(Message::Text(hello.to_string())).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            if socket.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
    }
}

async fn start_server(drop_first: bool) -> (SocketAddr, Arc<AtomicUsize>) {
    common::init_tracing();
    let connections = Arc::new(AtomicUsize::new(0));
    let state = ServerState {
        connections: Arc::clone(&connections),
        drop_first,
    };
    let app = Router::new().route("/ws", get(ws_handler)).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, connections)
}

async fn next_event(client: &mut ChannelClient) -> EventEnvelope {
    timeout(Duration::from_secs(5), client.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("channel event stream ended")
}

#[tokio::test]
async fn test_real_socket_round_trip() {
    let (addr, _connections) = start_server(false).await;

    let tokens = TokenStore::in_memory();
    tokens.set("e2e-token");
    let mut client = ChannelClient::new(ChannelConfig::new(format!("ws://{}", addr)), tokens);

    client.connect();

    // The server's hello proves the handshake carried the token
    let hello = next_event(&mut client).await;
    assert_eq!(hello.event_type, "hello");
    assert_eq!(hello.data["token"], "e2e-token");
    assert_eq!(client.state(), ChannelState::Open);

    // Outbound envelopes echo back intact
    client
        .send("echo_me", json!({"n": 1}))
        .await
        .expect("send over live channel");
    let echoed = next_event(&mut client).await;
    assert_eq!(echoed.event_type, "echo_me");
    assert_eq!(echoed.data["n"], 1);

    client.disconnect();
    assert_eq!(client.state(), ChannelState::Idle);
}

#[tokio::test]
async fn test_recovers_after_server_drops_connection() {
    let (addr, connections) = start_server(true).await;

    let tokens = TokenStore::in_memory();
    tokens.set("e2e-token");
    let config = ChannelConfig::new(format!("ws://{}", addr))
        .with_backoff_base(Duration::from_millis(10));
    let mut client = ChannelClient::new(config, tokens);

    client.connect();

    // The first connection dies immediately; the hello arrives on the
    // reconnected one
    let hello = next_event(&mut client).await;
    assert_eq!(hello.event_type, "hello");
    assert_eq!(client.state(), ChannelState::Open);
    assert_eq!(connections.load(Ordering::SeqCst), 2);

    client.disconnect();
}
