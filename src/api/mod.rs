//! Authenticated HTTP client for the Deskwire API.
//!
//! This module provides the request layer every feature of the client goes
//! through:
//! - Bearer attachment from the shared token store
//! - One-shot refresh-and-replay recovery on 401
//! - Session lifecycle endpoints (login, logout, refresh)

pub mod client;
pub mod error;

pub use client::{
    ApiClient, ApiConfig, ApiResponse, RequestOptions, TokenResponse, DEFAULT_API_URL,
};
pub use error::ApiError;

// Callers name methods without depending on reqwest directly.
pub use reqwest::Method;
