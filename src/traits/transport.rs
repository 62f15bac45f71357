//! Channel transport trait abstraction.
//!
//! Provides a trait-based abstraction over the realtime socket, enabling
//! dependency injection and mocking in tests. The production implementation
//! lives in [`crate::adapters::TungsteniteTransport`].

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a channel transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The handshake with the remote endpoint failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// A frame could not be written to the socket
    #[error("send failed: {0}")]
    Send(String),

    /// The socket reported an error mid-stream
    #[error("socket error: {0}")]
    Socket(String),
}

/// A frame surfaced to the channel session loop.
///
/// Adapters reduce their protocol's message set to this: text payloads,
/// pings the session loop answers, and the close notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketFrame {
    /// A text payload. The channel speaks JSON text frames.
    Text(String),
    /// A ping that must be answered with a pong carrying the same bytes.
    Ping(Vec<u8>),
    /// The remote endpoint closed the connection.
    Close,
}

/// Write half of an established channel socket.
#[async_trait]
pub trait ChannelSink: Send {
    /// Send a text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Answer a ping.
    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Close the socket. Errors are ignored; the socket is gone either way.
    async fn close(&mut self);
}

/// Read half of an established channel socket.
#[async_trait]
pub trait ChannelStream: Send {
    /// Next frame, or `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<SocketFrame, TransportError>>;
}

/// Factory for channel sockets.
///
/// `connect` is called for the initial attempt and again for every reconnect
/// attempt; each call yields a fresh sink/stream pair. Splitting the halves
/// lets the session loop read and write concurrently.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Open a socket to `url`.
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn ChannelSink>, Box<dyn ChannelStream>), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(
            TransportError::Connect("refused".to_string()).to_string(),
            "connect failed: refused"
        );
        assert_eq!(
            TransportError::Send("broken pipe".to_string()).to_string(),
            "send failed: broken pipe"
        );
        assert_eq!(
            TransportError::Socket("reset".to_string()).to_string(),
            "socket error: reset"
        );
    }

    #[test]
    fn test_transport_error_implements_error_trait() {
        let err = TransportError::Connect("refused".to_string());
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn test_socket_frame_equality() {
        assert_eq!(
            SocketFrame::Text("{}".to_string()),
            SocketFrame::Text("{}".to_string())
        );
        assert_ne!(SocketFrame::Close, SocketFrame::Ping(vec![1]));
    }
}
