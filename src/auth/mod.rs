//! Session credentials for the Deskwire client.
//!
//! This module provides the authentication state layer:
//! - The shared [`TokenStore`] every client component reads from
//! - File-backed credential storage under `~/.deskwire/`

pub mod credentials;
pub mod store;

pub use credentials::CredentialsFile;
pub use store::{SessionStatus, TokenStore};
