use thiserror::Error;

/// Error categories surfaced by the upstream client (SPEC_FULL.md §4.2).
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    #[error("rate limited by upstream, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("access token missing or rejected (401)")]
    Unauthorized,

    #[error("access token expired mid-session")]
    AuthExpired,

    #[error("resource not found (404): {0}")]
    NotFound(String),

    #[error("upstream server error (status {status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("request canceled")]
    Canceled,
}

impl ClientError {
    /// Transient errors are the ones SPEC_FULL.md §4.2 says are retried by
    /// the client itself with backoff; `ServerError` and `Timeout` both
    /// qualify, `RateLimited` is handled separately via the token bucket.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::ServerError { .. } | ClientError::Timeout(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ClientError::Timeout(error.url().map(|u| u.to_string()).unwrap_or_default())
        } else if let Some(status) = error.status() {
            ClientError::ServerError {
                status: status.as_u16(),
                body: error.to_string(),
            }
        } else {
            ClientError::Decode(error.to_string())
        }
    }
}
