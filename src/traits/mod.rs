//! Trait abstractions for dependency injection and testability.
//!
//! This module provides trait-based abstractions for core functionality,
//! enabling dependency injection, mocking, and better testability.
//!
//! # Traits
//!
//! - [`ChannelTransport`] - Factory for realtime channel sockets
//! - [`ChannelSink`] / [`ChannelStream`] - The two halves of an open socket
//! - [`TokenPersistence`] - Session credential storage between runs

pub mod credentials;
pub mod transport;

pub use credentials::TokenPersistence;
pub use transport::{ChannelSink, ChannelStream, ChannelTransport, SocketFrame, TransportError};
