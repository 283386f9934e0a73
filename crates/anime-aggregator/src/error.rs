use thiserror::Error;

/// Errors a catalog source can surface to the aggregator
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {status_code} - {message}")]
    Api { status_code: i64, message: String },

    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Source panicked: {0}")]
    Panicked(String),
}

impl SourceError {
    /// Whether the request is worth repeating
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            SourceError::Api { status_code, .. } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
