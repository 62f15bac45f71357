//! Realtime event channel for the Deskwire client.
//!
//! This module provides a WebSocket-backed channel with automatic reconnection
//! support. Inbound server events arrive as [`EventEnvelope`] values in the
//! order the server sent them; outbound events use the same envelope.

pub mod client;
pub mod events;

pub use client::{
    ChannelClient, ChannelConfig, ChannelError, ChannelState, OfflineSendPolicy, DEFAULT_WS_URL,
};
pub use events::EventEnvelope;
