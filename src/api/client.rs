//! Authenticated HTTP client for the Deskwire API.
//!
//! Every request goes out with the current bearer credential and a JSON
//! content type. A 401 answer triggers one cookie-authenticated refresh
//! followed by one replay of the original request with the fresh token; a
//! second 401 propagates to the caller. The refresh call itself is issued on
//! the raw send path and never passes through that handling, which is what
//! makes a refresh loop impossible.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::error::ApiError;
use crate::auth::TokenStore;

/// Default base URL for the Deskwire API
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// Path of the refresh endpoint, relative to the base URL.
const REFRESH_PATH: &str = "/auth/refresh";

/// Configuration for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL every request path is joined to
    pub base_url: String,
    /// Deadline for the refresh call (default: 10s)
    ///
    /// Without one, a hung refresh would hang the original request with it.
    pub refresh_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            refresh_timeout: Duration::from_secs(10),
        }
    }
}

impl ApiConfig {
    /// Create a config against a custom base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Create config from the `DESKWIRE_API_URL` environment variable,
    /// falling back to [`DEFAULT_API_URL`].
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("DESKWIRE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self {
            base_url,
            ..Self::default()
        }
    }

    /// Set the refresh deadline.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }
}

/// Per-request extras for the occasional caller that needs them.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers, appended after the defaults
    pub headers: Vec<(String, String)>,
    /// Per-request deadline
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Response from a successful API call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw response body
    pub body: Bytes,
}

impl ApiResponse {
    /// Body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(ApiError::Json)
    }
}

/// Token payload returned by the login and refresh endpoints
/// (POST /auth/login and POST /auth/refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The bearer token
    #[serde(alias = "token")]
    pub access_token: String,
    /// Token scheme, when the server names one
    #[serde(default)]
    pub token_type: Option<String>,
    /// Seconds until expiry, when the server reports it
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Authenticated principal; opaque to this layer
    #[serde(default)]
    pub user: Option<Value>,
}

/// One logical request, captured before the first send and reused verbatim
/// for the single allowed replay.
#[derive(Debug)]
struct RequestPlan {
    method: Method,
    url: String,
    body: Option<Value>,
    options: RequestOptions,
}

impl RequestPlan {
    /// The refresh endpoint never gets the replay treatment, even when a
    /// caller reaches it through the generic request path.
    fn is_refresh(&self) -> bool {
        self.url.ends_with(REFRESH_PATH)
    }
}

/// HTTP client for the Deskwire API with transparent credential refresh.
///
/// Cloning is cheap; clones share the connection pool, the cookie jar, and
/// the [`TokenStore`].
#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: reqwest::Client,
    tokens: TokenStore,
}

impl ApiClient {
    /// Create a client against `config`, sharing `tokens` with the rest of
    /// the session.
    ///
    /// The cookie jar is enabled so the server's httpOnly refresh cookie set
    /// at login rides back on [`refresh_session`](Self::refresh_session).
    pub fn new(config: ApiConfig, tokens: TokenStore) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(ApiError::Http)?;
        Ok(Self {
            config,
            http,
            tokens,
        })
    }

    /// Create a client configured from the environment.
    pub fn from_env(tokens: TokenStore) -> Result<Self, ApiError> {
        Self::new(ApiConfig::from_env(), tokens)
    }

    /// The token store this client reads and maintains.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Issue a GET request.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::GET, path, None).await
    }

    /// Issue a POST request with a JSON body.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        let body = serde_json::to_value(body).map_err(ApiError::Json)?;
        self.request(Method::POST, path, Some(body)).await
    }

    /// Issue a PUT request with a JSON body.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        let body = serde_json::to_value(body).map_err(ApiError::Json)?;
        self.request(Method::PUT, path, Some(body)).await
    }

    /// Issue a DELETE request.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::DELETE, path, None).await
    }

    /// Issue a request with the standard credential handling.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, ApiError> {
        self.request_with(method, path, body, RequestOptions::default())
            .await
    }

    /// Issue a request with per-request extras.
    ///
    /// The bearer credential is read from the store at the moment of use. On
    /// a 401 the client refreshes the session once and replays the captured
    /// request once with the new token; any further 401 propagates as
    /// [`ApiError::Status`].
    pub async fn request_with(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let plan = RequestPlan {
            method,
            url: self.url_for(path),
            body,
            options,
        };

        // First attempt, with whatever credential is current right now.
        let first = self.send_plan(&plan, self.tokens.bearer()).await?;
        if first.status() != StatusCode::UNAUTHORIZED || plan.is_refresh() {
            return finalize(first).await;
        }

        debug!(url = %plan.url, "request rejected with 401, refreshing session");
        let fresh = match self.refresh_session().await {
            Ok(token) => token,
            Err(e) => {
                // Refresh is the end of the line: drop the credential and
                // let subscribers know the session died.
                self.tokens.expire();
                warn!("session refresh failed: {}", e);
                return Err(ApiError::SessionExpired(Box::new(e)));
            }
        };

        // Single replay with the fresh token. No second refresh.
        let replay = self.send_plan(&plan, Some(fresh)).await?;
        finalize(replay).await
    }

    /// Authenticate with the server.
    ///
    /// POST /auth/login
    ///
    /// Stores the returned bearer token on success. The response also sets
    /// the httpOnly refresh cookie in the client's jar, which is what arms
    /// [`refresh_session`](Self::refresh_session).
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let url = self.url_for("/auth/login");
        let body = serde_json::json!({
            "email": email,
            "password": password,
        });

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let payload: TokenResponse = response.json().await?;
        self.tokens.set(payload.access_token.clone());
        info!("logged in");
        Ok(payload)
    }

    /// End the session.
    ///
    /// POST /auth/logout
    ///
    /// Clears the token store regardless of the server's answer; locally the
    /// session is over either way.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self.request(Method::POST, "/auth/logout", None).await;
        self.tokens.clear();
        info!("logged out");
        result.map(|_| ())
    }

    /// Exchange the refresh cookie for a new bearer token.
    ///
    /// POST /auth/refresh
    ///
    /// Issued on the raw send path with its own deadline. The new token is
    /// stored before this returns. A failure here is terminal for the
    /// session; callers on the generic request path translate it into
    /// [`ApiError::SessionExpired`].
    pub async fn refresh_session(&self) -> Result<String, ApiError> {
        let url = self.url_for(REFRESH_PATH);
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.config.refresh_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let payload: TokenResponse = response.json().await?;
        self.tokens.set(payload.access_token.clone());
        info!("session refreshed");
        Ok(payload.access_token)
    }

    /// Send one attempt of `plan`, attaching `bearer` if present.
    async fn send_plan(
        &self,
        plan: &RequestPlan,
        bearer: Option<String>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut builder = self
            .http
            .request(plan.method.clone(), &plan.url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = &plan.body {
            builder = builder.json(body);
        }
        for (name, value) in &plan.options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = plan.options.timeout {
            builder = builder.timeout(timeout);
        }

        builder.send().await.map_err(ApiError::Http)
    }

    /// Join a request path onto the base URL.
    fn url_for(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Convert a raw response: success statuses become [`ApiResponse`], everything
/// else carries status and body out as [`ApiError::Status`].
async fn finalize(response: reqwest::Response) -> Result<ApiResponse, ApiError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(ApiError::Http)?;

    if status.is_success() {
        Ok(ApiResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    } else {
        Err(ApiError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).to_string(),
        })
    }
}
