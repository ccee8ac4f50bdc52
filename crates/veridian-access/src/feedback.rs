//! Per-record feedback reported back to the host after a push.

use serde::{Deserialize, Serialize};

/// Outcome of applying one desired [`crate::record::AccessRecord`].
///
/// Errors are human-readable strings accumulated across every binding or
/// policy mutation the record contributed to; a record with an empty error
/// list was applied in full.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessFeedback {
    /// External id of the record this feedback is for.
    pub external_id: String,
    /// Name the record actually ended up with in the target system, when
    /// it differs from the requested one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_name: Option<String>,
    /// External id the record should be tracked under from now on, when
    /// the apply changed the target-side identifiers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_external_id: Option<String>,
    /// Accumulated failure descriptions, empty on full success.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl AccessFeedback {
    /// Creates empty feedback for a record.
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            actual_name: None,
            actual_external_id: None,
            errors: Vec::new(),
        }
    }

    /// Appends a failure description.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Whether the record was applied without failures.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_starts_successful() {
        let feedback = AccessFeedback::new("record-1");
        assert!(feedback.is_success());
        assert_eq!(feedback.external_id, "record-1");
    }

    #[test]
    fn test_errors_accumulate() {
        let mut feedback = AccessFeedback::new("record-1");
        feedback.add_error("binding add failed: denied");
        feedback.add_error("binding delete failed: not found");
        assert!(!feedback.is_success());
        assert_eq!(feedback.errors.len(), 2);
    }
}
