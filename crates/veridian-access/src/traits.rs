//! Sync boundary traits between the host and a connector.
//!
//! A connector implements [`AccessSource`] for the pull direction and
//! [`AccessTarget`] for the push direction; the host supplies the sinks.

use async_trait::async_trait;

use crate::error::AccessResult;
use crate::feedback::AccessFeedback;
use crate::record::AccessRecord;

/// Host callback receiving imported records in batches.
///
/// An error from the sink aborts the pull run.
#[async_trait]
pub trait RecordSink: Send {
    /// Ingests a batch of records.
    async fn handle(&mut self, records: Vec<AccessRecord>) -> AccessResult<()>;
}

/// Host callback receiving per-record apply feedback.
#[async_trait]
pub trait FeedbackSink: Send {
    /// Accepts feedback for one desired record.
    async fn handle(&mut self, feedback: AccessFeedback) -> AccessResult<()>;
}

/// The pull direction: read native grants and normalize them into records.
#[async_trait]
pub trait AccessSource: Send + Sync {
    /// Imports the target system's current access state into the sink.
    async fn sync_access_from_target(&self, sink: &mut dyn RecordSink) -> AccessResult<()>;
}

/// The push direction: converge the target system onto desired records.
///
/// Per-binding mutation failures are reported through the feedback sink and
/// never abort the run; only sink I/O failures surface as the run's error.
#[async_trait]
pub trait AccessTarget: Send + Sync {
    /// Applies the desired records, reporting per-record feedback.
    async fn sync_access_to_target(
        &self,
        desired: Vec<AccessRecord>,
        feedback: &mut dyn FeedbackSink,
    ) -> AccessResult<()>;
}

/// Collecting sink buffering every record batch, for tests and simple hosts.
#[derive(Debug, Default)]
pub struct CollectingRecordSink {
    /// Records received so far, in ingestion order.
    pub records: Vec<AccessRecord>,
}

#[async_trait]
impl RecordSink for CollectingRecordSink {
    async fn handle(&mut self, records: Vec<AccessRecord>) -> AccessResult<()> {
        self.records.extend(records);
        Ok(())
    }
}

/// Collecting sink buffering every feedback message.
#[derive(Debug, Default)]
pub struct CollectingFeedbackSink {
    /// Feedback received so far, in delivery order.
    pub feedback: Vec<AccessFeedback>,
}

#[async_trait]
impl FeedbackSink for CollectingFeedbackSink {
    async fn handle(&mut self, feedback: AccessFeedback) -> AccessResult<()> {
        self.feedback.push(feedback);
        Ok(())
    }
}
