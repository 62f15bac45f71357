//! Tungstenite-based channel transport.
//!
//! Production implementation of [`ChannelTransport`]: every `connect` opens a
//! real WebSocket via tokio-tungstenite and hands back its split halves.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::traits::{ChannelSink, ChannelStream, ChannelTransport, SocketFrame, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Channel transport that opens real WebSocket connections.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteTransport;

impl TungsteniteTransport {
    /// Create the production transport.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelTransport for TungsteniteTransport {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn ChannelSink>, Box<dyn ChannelStream>), TransportError> {
        let (socket, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (sink, stream) = socket.split();
        Ok((
            Box::new(TungsteniteSink { sink }),
            Box::new(TungsteniteStream { stream }),
        ))
    }
}

struct TungsteniteSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl ChannelSink for TungsteniteSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), TransportError> {
        self.sink
            .send(Message::Pong(payload))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

struct TungsteniteStream {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl ChannelStream for TungsteniteStream {
    async fn next_frame(&mut self) -> Option<Result<SocketFrame, TransportError>> {
        loop {
            return match self.stream.next().await? {
                Ok(Message::Text(text)) => Some(Ok(SocketFrame::Text(text))),
                Ok(Message::Ping(payload)) => Some(Ok(SocketFrame::Ping(payload))),
                Ok(Message::Close(_)) => Some(Ok(SocketFrame::Close)),
                // Binary, Pong and raw frames carry nothing for the channel
                Ok(_) => continue,
                Err(e) => Some(Err(TransportError::Socket(e.to_string()))),
            };
        }
    }
}
