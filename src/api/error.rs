//! Error type for API client operations.

/// Error type for API client operations.
#[derive(Debug)]
pub enum ApiError {
    /// HTTP request failed before a response arrived
    Http(reqwest::Error),
    /// JSON serialization or deserialization failed
    Json(serde_json::Error),
    /// Server returned an error status
    ///
    /// After the single refresh-and-replay cycle, a 401 lands here like any
    /// other status.
    Status { status: u16, body: String },
    /// The credential refresh failed; the session is over and the token
    /// store has been cleared
    SessionExpired(Box<ApiError>),
}

impl ApiError {
    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::SessionExpired(inner) => inner.status(),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Http(e) => write!(f, "HTTP error: {}", e),
            ApiError::Json(e) => write!(f, "JSON error: {}", e),
            ApiError::Status { status, body } => {
                write!(f, "Server error ({}): {}", status, body)
            }
            ApiError::SessionExpired(cause) => write!(f, "Session expired: {}", cause),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Http(e) => Some(e),
            ApiError::Json(e) => Some(e),
            ApiError::SessionExpired(cause) => Some(cause),
            ApiError::Status { .. } => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Http(e)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Json(e)
    }
}
