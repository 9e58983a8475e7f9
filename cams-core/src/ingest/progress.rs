//! Progress notifications for running jobs.

use super::job::{JobId, JobSnapshot, JobStatus, Phase};
use crate::Result;
use crate::error::CamsError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Progress of one job at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Job the event belongs to
    pub job_id: JobId,
    /// Job status at publication time
    pub status: JobStatus,
    /// Pipeline phase of the current file
    pub phase: Phase,
    /// Human-readable current operation
    pub operation: String,
    /// Index of the file being processed
    pub file_index: Option<usize>,
    /// Name of the file being processed
    pub file_name: Option<String>,
    /// Rows of the current file handled so far
    pub file_processed_rows: usize,
    /// Rows parsed from the current file
    pub file_total_rows: usize,
    /// Rows handled across the job
    pub processed_rows: usize,
    /// Rows parsed across the job
    pub total_rows: usize,
    /// Errors recorded across the job
    pub error_count: usize,
    /// Job progress, rounded to one decimal
    pub percentage: f64,
}

impl ProgressEvent {
    /// Summarizes a snapshot, focused on its current file.
    pub fn from_snapshot(snapshot: &JobSnapshot) -> Self {
        let file = snapshot.current_file.and_then(|i| snapshot.files.get(i));
        Self {
            job_id: snapshot.job_id,
            status: snapshot.status,
            phase: snapshot.phase,
            operation: snapshot.phase.to_string(),
            file_index: snapshot.current_file,
            file_name: file.map(|f| f.file_name.clone()),
            file_processed_rows: file.map_or(0, |f| f.processed_rows),
            file_total_rows: file.map_or(0, |f| f.total_rows),
            processed_rows: snapshot.processed_rows(),
            total_rows: snapshot.total_rows(),
            error_count: snapshot.error_count(),
            percentage: (snapshot.percentage() * 10.0).round() / 10.0,
        }
    }
}

/// Publishes progress to an external channel.
///
/// Failures are logged by the engine and never stop a job.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Publishes one event for `job_id`.
    async fn publish(&self, job_id: JobId, event: &ProgressEvent) -> Result<()>;
}

/// Writes progress as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressReporter;

#[async_trait]
impl ProgressReporter for TracingProgressReporter {
    async fn publish(&self, job_id: JobId, event: &ProgressEvent) -> Result<()> {
        tracing::info!(
            job_id = %job_id,
            status = %event.status,
            file = event.file_name.as_deref().unwrap_or("-"),
            processed = event.processed_rows,
            total = event.total_rows,
            errors = event.error_count,
            percentage = event.percentage,
            "{}",
            event.operation
        );
        Ok(())
    }
}

/// Forwards events into a bounded channel without waiting.
#[derive(Debug, Clone)]
pub struct ChannelProgressReporter {
    sender: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgressReporter {
    /// Reporter sending into an existing channel.
    pub fn new(sender: mpsc::Sender<ProgressEvent>) -> Self {
        Self { sender }
    }

    /// Reporter plus the receiving end of a channel holding `capacity` events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl ProgressReporter for ChannelProgressReporter {
    async fn publish(&self, job_id: JobId, event: &ProgressEvent) -> Result<()> {
        match self.sender.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(job_id = %job_id, "Progress channel full, event dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(CamsError::configuration("Progress channel closed"))
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressReporter;

#[async_trait]
impl ProgressReporter for NullProgressReporter {
    async fn publish(&self, _job_id: JobId, _event: &ProgressEvent) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::job::{BulkUploadRequest, UploadFile};
    use uuid::Uuid;

    fn event() -> ProgressEvent {
        let request = BulkUploadRequest::new(vec![UploadFile::new("users.csv", b"x".to_vec())]);
        let mut snapshot = JobSnapshot::new(Uuid::new_v4(), &request);
        snapshot.current_file = Some(0);
        snapshot.files[0].total_rows = 4;
        snapshot.files[0].processed_rows = 1;
        ProgressEvent::from_snapshot(&snapshot)
    }

    #[test]
    fn test_event_from_snapshot() {
        let event = event();
        assert_eq!(event.file_name.as_deref(), Some("users.csv"));
        assert_eq!(event.total_rows, 4);
        assert!((event.percentage - 25.0).abs() < 1e-9);
        assert_eq!(event.operation, "Queued");
    }

    #[tokio::test]
    async fn test_channel_drops_when_full() {
        let (reporter, mut receiver) = ChannelProgressReporter::channel(1);
        let event = event();
        reporter.publish(event.job_id, &event).await.unwrap();
        reporter.publish(event.job_id, &event).await.unwrap();
        assert!(receiver.recv().await.is_some());
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_channel_reports_closed_receiver() {
        let (reporter, receiver) = ChannelProgressReporter::channel(4);
        drop(receiver);
        let event = event();
        assert!(reporter.publish(event.job_id, &event).await.is_err());
    }
}
