//! Concrete implementations of trait abstractions.
//!
//! This module provides production adapters for the traits defined in
//! `crate::traits`, plus test doubles under [`mock`].
//!
//! # Adapters
//!
//! - [`TungsteniteTransport`] - Channel transport using tokio-tungstenite
//! - [`crate::auth::CredentialsFile`] - File-based token persistence
//!
//! # Mock Implementations
//!
//! - [`mock::MockTransport`] - Scripted channel transport
//! - [`mock::MemoryTokenFile`] - In-memory token persistence

pub mod mock;
pub mod tungstenite_ws;

pub use tungstenite_ws::TungsteniteTransport;
