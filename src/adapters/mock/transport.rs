//! Scripted channel transport for testing.
//!
//! Lets a test decide the outcome of every connect attempt, inject inbound
//! frames, and inspect what the client sent, all without a real socket.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::traits::{ChannelSink, ChannelStream, ChannelTransport, SocketFrame, TransportError};

/// Handle a test uses to drive one scripted connection.
///
/// Obtained from [`MockTransport::expect_connect`]. Frames pushed here come
/// out of the client's read half; everything the client writes is captured
/// for inspection.
#[derive(Clone)]
pub struct ScriptedSocket {
    frames_tx: mpsc::UnboundedSender<Result<SocketFrame, TransportError>>,
    sent: Arc<Mutex<Vec<String>>>,
    pongs: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedSocket {
    /// Deliver a text frame to the client.
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.frames_tx.send(Ok(SocketFrame::Text(text.into())));
    }

    /// Deliver a ping the client is expected to answer.
    pub fn push_ping(&self, payload: Vec<u8>) {
        let _ = self.frames_tx.send(Ok(SocketFrame::Ping(payload)));
    }

    /// Close the connection from the server side.
    pub fn drop_connection(&self) {
        let _ = self.frames_tx.send(Ok(SocketFrame::Close));
    }

    /// Surface a transport error on the read half.
    pub fn fail(&self, message: &str) {
        let _ = self
            .frames_tx
            .send(Err(TransportError::Socket(message.to_string())));
    }

    /// Text frames the client has sent over this connection.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Pong payloads the client has sent over this connection.
    pub fn pongs(&self) -> Vec<Vec<u8>> {
        self.pongs.lock().unwrap().clone()
    }

    /// Whether the client closed its write half.
    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Wires handed to the client when a scripted connect succeeds.
struct SocketWires {
    frames_rx: mpsc::UnboundedReceiver<Result<SocketFrame, TransportError>>,
    sent: Arc<Mutex<Vec<String>>>,
    pongs: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

enum ConnectOutcome {
    Accept(Box<SocketWires>),
    Refuse(String),
}

/// Scripted channel transport for testing.
///
/// Each queued outcome answers one `connect` call, in order. An exhausted
/// script refuses further attempts, which is how tests starve the reconnect
/// loop.
///
/// # Example
///
/// ```ignore
/// use deskwire::adapters::mock::MockTransport;
/// use std::sync::Arc;
///
/// let transport = Arc::new(MockTransport::new());
/// let socket = transport.expect_connect();
///
/// // ... hand the transport to a ChannelClient, connect ...
///
/// socket.push_text(r#"{"type":"ticket_created","data":{},"timestamp":"2026-01-01T00:00:00Z"}"#);
/// socket.drop_connection();
/// assert_eq!(transport.connect_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<VecDeque<ConnectOutcome>>>,
    connect_urls: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful connection and get the handle driving it.
    pub fn expect_connect(&self) -> ScriptedSocket {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let pongs = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let wires = SocketWires {
            frames_rx,
            sent: Arc::clone(&sent),
            pongs: Arc::clone(&pongs),
            closed: Arc::clone(&closed),
        };
        self.script
            .lock()
            .unwrap()
            .push_back(ConnectOutcome::Accept(Box::new(wires)));

        ScriptedSocket {
            frames_tx,
            sent,
            pongs,
            closed,
        }
    }

    /// Queue a refused connection attempt.
    pub fn refuse_connect(&self, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(ConnectOutcome::Refuse(reason.to_string()));
    }

    /// URLs passed to `connect`, in call order.
    pub fn connect_urls(&self) -> Vec<String> {
        self.connect_urls.lock().unwrap().clone()
    }

    /// Number of `connect` calls observed so far.
    pub fn connect_count(&self) -> usize {
        self.connect_urls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelTransport for MockTransport {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn ChannelSink>, Box<dyn ChannelStream>), TransportError> {
        self.connect_urls.lock().unwrap().push(url.to_string());

        let outcome = self.script.lock().unwrap().pop_front();
        match outcome {
            Some(ConnectOutcome::Accept(wires)) => {
                let sink = MockSink {
                    sent: wires.sent,
                    pongs: wires.pongs,
                    closed: wires.closed,
                };
                let stream = MockStream {
                    frames_rx: wires.frames_rx,
                };
                Ok((Box::new(sink), Box::new(stream)))
            }
            Some(ConnectOutcome::Refuse(reason)) => Err(TransportError::Connect(reason)),
            None => Err(TransportError::Connect(
                "no scripted connection available".to_string(),
            )),
        }
    }
}

struct MockSink {
    sent: Arc<Mutex<Vec<String>>>,
    pongs: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl ChannelSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn send_pong(&mut self, payload: Vec<u8>) -> Result<(), TransportError> {
        self.pongs.lock().unwrap().push(payload);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct MockStream {
    frames_rx: mpsc::UnboundedReceiver<Result<SocketFrame, TransportError>>,
}

#[async_trait]
impl ChannelStream for MockStream {
    async fn next_frame(&mut self) -> Option<Result<SocketFrame, TransportError>> {
        self.frames_rx.recv().await
    }
}
