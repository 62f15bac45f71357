//! Self-healing realtime event channel.
//!
//! Maintains one socket session per authenticated login, hands inbound events
//! to the consumer in arrival order, and reconnects with exponential backoff
//! after unexpected closes. A deliberate [`ChannelClient::disconnect`] (or a
//! logout) never triggers a reconnect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::events::EventEnvelope;
use crate::adapters::TungsteniteTransport;
use crate::auth::{SessionStatus, TokenStore};
use crate::traits::{ChannelSink, ChannelStream, ChannelTransport, SocketFrame};

/// Default WebSocket base URL when `DESKWIRE_WS_URL` is unset
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000";

/// Outbound queue depth per session
const OUTBOUND_BUFFER: usize = 100;

/// Channel connection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// No session: never started, deliberately closed, logged out, or out of
    /// reconnect attempts
    Idle,
    /// A connect attempt is in flight
    Connecting,
    /// The socket is up
    Open,
    /// Waiting out the backoff delay before reconnect attempt `attempt`
    Reconnecting { attempt: u8 },
}

/// What [`ChannelClient::send`] does while the channel is not open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfflineSendPolicy {
    /// Drop the message silently
    #[default]
    Drop,
    /// Fail the call with [`ChannelError::NotConnected`]
    Reject,
}

/// Channel client errors
#[derive(Debug, Clone)]
pub enum ChannelError {
    /// The channel is not open and the send policy rejects offline sends
    NotConnected,
    /// The outbound payload did not serialize
    Serialize(String),
    /// The message could not be handed to the session
    SendFailed(String),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::NotConnected => write!(f, "Channel not connected"),
            ChannelError::Serialize(msg) => write!(f, "Serialize failed: {}", msg),
            ChannelError::SendFailed(msg) => write!(f, "Send failed: {}", msg),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Configuration for [`ChannelClient`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket base URL; the channel lives at `<url>/ws`
    pub url: String,
    /// Reconnect attempts after an unexpected close before giving up
    pub max_reconnect_attempts: u8,
    /// Unit for the backoff schedule; attempt `n` waits `base * 2^n`
    pub backoff_base: Duration,
    /// Cap on a single backoff delay
    pub max_backoff: Duration,
    /// Capacity of the inbound event buffer the consumer drains
    pub event_buffer: usize,
    /// Policy for sends while not open
    pub offline_send: OfflineSendPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            max_reconnect_attempts: 5,
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            event_buffer: 256,
            offline_send: OfflineSendPolicy::Drop,
        }
    }
}

impl ChannelConfig {
    /// Create a config against a custom WebSocket base URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create config from the `DESKWIRE_WS_URL` environment variable,
    /// falling back to [`DEFAULT_WS_URL`].
    pub fn from_env() -> Self {
        let url = std::env::var("DESKWIRE_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
        Self {
            url,
            ..Self::default()
        }
    }

    /// Set the reconnect attempt limit.
    pub fn with_max_reconnect_attempts(mut self, attempts: u8) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the backoff unit.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the backoff cap.
    pub fn with_max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff = max;
        self
    }

    /// Set the inbound event buffer capacity.
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// Set the offline send policy.
    pub fn with_offline_send(mut self, policy: OfflineSendPolicy) -> Self {
        self.offline_send = policy;
        self
    }
}

/// Handle on the live session task.
struct Session {
    shutdown_tx: watch::Sender<bool>,
    outbound_tx: mpsc::Sender<String>,
    task: JoinHandle<()>,
}

/// Realtime event channel tied to the authenticated session.
///
/// The client owns the inbound event queue; the session task running the
/// socket is a background worker replaced on every [`connect`] cycle.
///
/// [`connect`]: ChannelClient::connect
pub struct ChannelClient {
    config: ChannelConfig,
    tokens: TokenStore,
    transport: Arc<dyn ChannelTransport>,
    state_tx: Arc<watch::Sender<ChannelState>>,
    state_rx: watch::Receiver<ChannelState>,
    events_tx: mpsc::Sender<EventEnvelope>,
    events_rx: mpsc::Receiver<EventEnvelope>,
    generation: Arc<AtomicU64>,
    session: Option<Session>,
}

impl ChannelClient {
    /// Create a channel over the production WebSocket transport.
    pub fn new(config: ChannelConfig, tokens: TokenStore) -> Self {
        Self::with_transport(config, tokens, Arc::new(TungsteniteTransport::new()))
    }

    /// Create a channel over an injected transport.
    pub fn with_transport(
        config: ChannelConfig,
        tokens: TokenStore,
        transport: Arc<dyn ChannelTransport>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ChannelState::Idle);
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer.max(1));
        Self {
            config,
            tokens,
            transport,
            state_tx: Arc::new(state_tx),
            state_rx,
            events_tx,
            events_rx,
            generation: Arc::new(AtomicU64::new(0)),
            session: None,
        }
    }

    /// Start the channel session.
    ///
    /// Idempotent: a live session is left untouched. Without a credential
    /// this does nothing; the channel follows the authenticated session.
    pub fn connect(&mut self) {
        if let Some(session) = &self.session {
            if !session.task.is_finished() {
                debug!("Channel session already running, ignoring connect");
                return;
            }
        }
        if !self.tokens.is_authenticated() {
            debug!("No credential, channel stays idle");
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let publisher = Publisher {
            state: Arc::clone(&self.state_tx),
            current: Arc::clone(&self.generation),
            generation,
        };

        let task = tokio::spawn(run_session(
            self.config.clone(),
            self.tokens.clone(),
            Arc::clone(&self.transport),
            self.events_tx.clone(),
            outbound_rx,
            publisher,
            shutdown_rx,
        ));

        self.session = Some(Session {
            shutdown_tx,
            outbound_tx,
            task,
        });
    }

    /// Close the channel on purpose.
    ///
    /// Cancels any pending reconnect, drops the socket, and goes `Idle`. No
    /// reconnect happens until [`connect`](Self::connect) is called again.
    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            // Supersede the session's generation first so nothing it does
            // from here on can move the published state.
            self.generation.fetch_add(1, Ordering::SeqCst);
            let _ = session.shutdown_tx.send(true);
            let _ = self.state_tx.send(ChannelState::Idle);
            info!("Channel disconnected");
        }
    }

    /// Whether the channel is open right now.
    pub fn is_connected(&self) -> bool {
        *self.state_rx.borrow() == ChannelState::Open
    }

    /// The current connection state.
    pub fn state(&self) -> ChannelState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Receive the next inbound event, in arrival order.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.events_rx.recv().await
    }

    /// Take one inbound event without waiting.
    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        self.events_rx.try_recv().ok()
    }

    /// Send an event over the channel.
    ///
    /// The payload is wrapped as `{type, data, timestamp}`. While the channel
    /// is not open the configured [`OfflineSendPolicy`] decides the outcome.
    pub async fn send(&self, event_type: &str, data: Value) -> Result<(), ChannelError> {
        let session = match &self.session {
            Some(session) if self.is_connected() && !session.task.is_finished() => session,
            _ => {
                return match self.config.offline_send {
                    OfflineSendPolicy::Drop => {
                        debug!("Channel not open, dropping outbound '{}'", event_type);
                        Ok(())
                    }
                    OfflineSendPolicy::Reject => Err(ChannelError::NotConnected),
                };
            }
        };

        let envelope = EventEnvelope::now(event_type, data);
        let wire = envelope
            .to_wire()
            .map_err(|e| ChannelError::Serialize(e.to_string()))?;
        session
            .outbound_tx
            .send(wire)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// State publisher owned by one session task.
///
/// Every write is guarded by the session generation: once the client has
/// moved on (deliberate disconnect or a newer session), a superseded task's
/// late writes are discarded instead of resurrecting stale state.
#[derive(Clone)]
struct Publisher {
    state: Arc<watch::Sender<ChannelState>>,
    current: Arc<AtomicU64>,
    generation: u64,
}

impl Publisher {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// Publish `state` unless this session has been superseded.
    fn set_state(&self, state: ChannelState) {
        self.state.send_if_modified(|slot| {
            if self.current.load(Ordering::SeqCst) != self.generation {
                return false;
            }
            *slot = state;
            true
        });
    }
}

/// Why the pump stopped.
enum PumpExit {
    /// Deliberate shutdown (disconnect or client drop)
    Shutdown,
    /// The authenticated session ended; close without reconnect
    SessionEnded,
    /// Unexpected close or transport error; reconnect path
    Disconnected,
}

/// Run one channel session: connect, pump, reconnect with backoff.
async fn run_session(
    config: ChannelConfig,
    tokens: TokenStore,
    transport: Arc<dyn ChannelTransport>,
    events_tx: mpsc::Sender<EventEnvelope>,
    mut outbound_rx: mpsc::Receiver<String>,
    publisher: Publisher,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut status_rx = tokens.status();
    let mut attempts: u8 = 0;

    loop {
        // Always the latest credential; logged out means done.
        let bearer = match tokens.bearer() {
            Some(token) => token,
            None => {
                info!("No credential, channel going idle");
                publisher.set_state(ChannelState::Idle);
                return;
            }
        };

        publisher.set_state(ChannelState::Connecting);
        let url = channel_url(&config.url, &bearer);

        let connected = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => return,
            result = transport.connect(&url) => result,
        };

        match connected {
            Ok((mut sink, mut stream)) => {
                info!("Channel connected");
                attempts = 0;
                publisher.set_state(ChannelState::Open);

                let exit = pump(
                    sink.as_mut(),
                    stream.as_mut(),
                    &events_tx,
                    &mut outbound_rx,
                    &publisher,
                    &mut shutdown_rx,
                    &mut status_rx,
                )
                .await;
                sink.close().await;

                match exit {
                    PumpExit::Shutdown => return,
                    PumpExit::SessionEnded => {
                        publisher.set_state(ChannelState::Idle);
                        return;
                    }
                    PumpExit::Disconnected => {}
                }
            }
            Err(e) => {
                warn!("Channel connect failed: {}", e);
            }
        }

        // Unexpected close or failed attempt: back off, then try again.
        attempts += 1;
        if attempts > config.max_reconnect_attempts {
            error!(
                "Failed to reconnect after {} attempts, giving up",
                config.max_reconnect_attempts
            );
            publisher.set_state(ChannelState::Idle);
            return;
        }

        publisher.set_state(ChannelState::Reconnecting { attempt: attempts });
        let delay = backoff_delay(config.backoff_base, attempts, config.max_backoff);
        info!(
            "Reconnection attempt {} of {}, waiting {:?}",
            attempts, config.max_reconnect_attempts, delay
        );

        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                debug!("Shutdown requested during backoff");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Pump one open socket until it closes or the session ends.
async fn pump(
    sink: &mut dyn ChannelSink,
    stream: &mut dyn ChannelStream,
    events_tx: &mpsc::Sender<EventEnvelope>,
    outbound_rx: &mut mpsc::Receiver<String>,
    publisher: &Publisher,
    shutdown_rx: &mut watch::Receiver<bool>,
    status_rx: &mut watch::Receiver<SessionStatus>,
) -> PumpExit {
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                debug!("Shutdown signal received, closing connection");
                return PumpExit::Shutdown;
            }

            changed = status_rx.changed() => {
                match changed {
                    // A mid-session refresh keeps the socket; the server
                    // accepted the handshake it already has.
                    Ok(()) if *status_rx.borrow() == SessionStatus::Active => {
                        debug!("Credential rotated, keeping channel open");
                    }
                    _ => {
                        info!("Session ended, closing channel");
                        return PumpExit::SessionEnded;
                    }
                }
            }

            frame = stream.next_frame() => {
                match frame {
                    Some(Ok(SocketFrame::Text(text))) => {
                        match EventEnvelope::parse(&text) {
                            Ok(event) => {
                                if !publisher.is_current() {
                                    return PumpExit::Shutdown;
                                }
                                // Arrival order is preserved; a full buffer
                                // backpressures instead of dropping.
                                tokio::select! {
                                    biased;
                                    _ = shutdown_rx.changed() => return PumpExit::Shutdown,
                                    sent = events_tx.send(event) => {
                                        if sent.is_err() {
                                            warn!("Event consumer gone, closing channel");
                                            return PumpExit::Shutdown;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("Failed to parse channel message: {} - {}", e, text);
                                // Skip malformed messages without crashing
                            }
                        }
                    }
                    Some(Ok(SocketFrame::Ping(payload))) => {
                        debug!("Received ping, sending pong");
                        let _ = sink.send_pong(payload).await;
                    }
                    Some(Ok(SocketFrame::Close)) => {
                        info!("Received close frame from server");
                        return PumpExit::Disconnected;
                    }
                    Some(Err(e)) => {
                        // Transport errors fold into the close pathway; the
                        // reconnect logic takes it from here.
                        error!("Channel transport error: {}", e);
                        return PumpExit::Disconnected;
                    }
                    None => {
                        info!("Channel stream ended");
                        return PumpExit::Disconnected;
                    }
                }
            }

            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(wire) => {
                        if let Err(e) = sink.send_text(wire).await {
                            // The read side will notice the dead socket and
                            // drive the reconnect.
                            error!("Failed to send channel message: {}", e);
                        }
                    }
                    None => {
                        debug!("Outbound channel closed, shutting down");
                        return PumpExit::Shutdown;
                    }
                }
            }
        }
    }
}

/// Channel endpoint with the credential as a query parameter. The WebSocket
/// handshake cannot carry custom headers, so auth rides in the URL.
fn channel_url(base: &str, bearer: &str) -> String {
    format!(
        "{}/ws?token={}",
        base.trim_end_matches('/'),
        urlencoding::encode(bearer)
    )
}

/// Backoff before reconnect attempt `attempt` (1-based): `base * 2^attempt`,
/// capped at `max`. The default schedule is 2s, 4s, 8s, 16s, 32s.
fn backoff_delay(base: Duration, attempt: u8, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(u32::from(attempt)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(max)
}
