//! Mock implementations for testing.
//!
//! This module provides test doubles for the trait abstractions, enabling
//! unit and integration tests without network or file system access.
//!
//! # Available Mocks
//!
//! - [`MockTransport`] - Channel transport with scripted connect outcomes
//! - [`MemoryTokenFile`] - Token persistence with operation recording

pub mod credentials;
pub mod transport;

pub use credentials::{MemoryTokenFile, PersistOp};
pub use transport::{MockTransport, ScriptedSocket};
