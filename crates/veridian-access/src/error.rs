//! Error types for the access model boundary.

use thiserror::Error;

/// Result type alias using [`AccessError`].
pub type AccessResult<T> = Result<T, AccessError>;

/// Errors crossing the host boundary.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The host failed to ingest a batch of records; the run aborts.
    #[error("record ingestion failed: {0}")]
    Ingestion(String),

    /// The host failed to accept a feedback message.
    #[error("feedback delivery failed: {0}")]
    Feedback(String),

    /// A desired record carries an action the connector cannot apply.
    #[error("unsupported action '{action}' for record '{external_id}'")]
    UnsupportedAction {
        external_id: String,
        action: String,
    },

    /// A desired record is malformed.
    #[error("invalid record '{external_id}': {message}")]
    InvalidRecord {
        external_id: String,
        message: String,
    },

    /// A provider-side failure that aborts the run.
    #[error("provider error: {0}")]
    Provider(String),

    /// Several independent errors from one run.
    #[error("{} errors during sync: {}", .0.len(), summarize(.0))]
    Multiple(Vec<AccessError>),
}

impl AccessError {
    /// Folds a list of errors into a single error, or `None` when empty.
    ///
    /// A single error is returned as itself rather than wrapped.
    pub fn aggregate(mut errors: Vec<AccessError>) -> Option<AccessError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(AccessError::Multiple(errors)),
        }
    }
}

fn summarize(errors: &[AccessError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
