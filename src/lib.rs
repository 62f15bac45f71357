//! Deskwire client communication layer.
//!
//! The resilient plumbing between a Deskwire front end and its server: an
//! authenticated API client that transparently refreshes and replays requests
//! when the session credential expires, a realtime event channel that heals
//! itself with exponential backoff, and the shared token store both sit on.
//!
//! UI concerns live elsewhere. This crate exposes plain data, async channels,
//! and state watches for the embedding application to consume.

pub mod adapters;
pub mod api;
pub mod auth;
pub mod channel;
pub mod prelude;
pub mod traits;
