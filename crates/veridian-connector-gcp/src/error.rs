//! Error types for the GCP connector.

use thiserror::Error;

/// Result type alias using [`GcpError`].
pub type GcpResult<T> = Result<T, GcpError>;

/// Errors that can occur when interacting with GCP.
#[derive(Debug, Error)]
pub enum GcpError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Service-account authentication error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Structured error returned by a Google API.
    #[error("API error {code} ({status}): {message}")]
    Api {
        code: u16,
        status: String,
        message: String,
    },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Resource traversal error.
    #[error("Traversal error: {0}")]
    Traversal(String),

    /// Import (pull) conversion error.
    #[error("Import error: {0}")]
    Import(String),

    /// Masking policy lifecycle error.
    #[error("Masking error: {0}")]
    Masking(String),

    /// Masking requested while the masking catalog is not enabled.
    #[error("Masking is not supported on this data source")]
    MaskingUnsupported,

    /// The host failed to ingest a record batch; the run aborts.
    #[error("Host ingestion failed: {0}")]
    Host(String),

    /// Feedback-sink I/O failures aggregated at the top of the push path.
    #[error("{} feedback delivery failures: {}", .0.len(), .0.join("; "))]
    FeedbackDelivery(Vec<String>),
}

impl GcpError {
    /// Whether this error is the provider's authorization rejection.
    ///
    /// Such rejections degrade to "empty policy" or "zero children" on the
    /// pull path instead of aborting the run.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            GcpError::Api { code, status, .. } => {
                *code == 403 || status.eq_ignore_ascii_case("PERMISSION_DENIED")
            }
            _ => false,
        }
    }

    /// Create an API error from an error envelope's fields.
    pub fn api(code: u16, status: impl Into<String>, message: impl Into<String>) -> Self {
        GcpError::Api {
            code,
            status: status.into(),
            message: message.into(),
        }
    }
}

impl From<GcpError> for veridian_access::error::AccessError {
    fn from(err: GcpError) -> Self {
        veridian_access::error::AccessError::Provider(err.to_string())
    }
}
