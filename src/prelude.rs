//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types from the deskwire library,
//! providing a convenient way to import the most frequently used items.
//!
//! # Usage
//!
//! ```ignore
//! use deskwire::prelude::*;
//! ```
//!
//! This will import:
//! - API types (ApiClient, ApiConfig, ApiError, ApiResponse)
//! - Auth types (TokenStore, SessionStatus, CredentialsFile)
//! - Channel types (ChannelClient, ChannelConfig, ChannelState, EventEnvelope)

// API types
pub use crate::api::{ApiClient, ApiConfig, ApiError, ApiResponse, Method, RequestOptions};

// Auth types
pub use crate::auth::{CredentialsFile, SessionStatus, TokenStore};

// Channel types
pub use crate::channel::{
    ChannelClient, ChannelConfig, ChannelError, ChannelState, EventEnvelope, OfflineSendPolicy,
};
