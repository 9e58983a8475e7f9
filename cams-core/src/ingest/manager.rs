//! Job submission, tracking and cancellation.

use super::engine::{BatchIngestionEngine, SharedSnapshot};
use super::job::{BulkUploadRequest, JobId, JobSnapshot, JobStatus, Phase};
use super::schema::{SCHEMAS, TableType};
use crate::Result;
use crate::error::CamsError;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

struct ActiveJob {
    state: SharedSnapshot,
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

type ActiveJobs = Arc<RwLock<HashMap<JobId, ActiveJob>>>;
type History = Arc<RwLock<VecDeque<JobSnapshot>>>;

/// Runs each submitted job on its own task and keeps a bounded history of
/// finished jobs.
///
/// Jobs share nothing mutable with each other; each has its own snapshot
/// and cancellation token. Dropping the manager cancels running jobs.
pub struct JobManager {
    engine: Arc<BatchIngestionEngine>,
    active: ActiveJobs,
    history: History,
    shutdown: CancellationToken,
}

impl JobManager {
    /// Creates a manager running jobs on `engine`.
    pub fn new(engine: Arc<BatchIngestionEngine>) -> Self {
        Self {
            engine,
            active: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(VecDeque::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Validates a request and starts it in the background.
    ///
    /// # Errors
    /// Returns `Validation` if the request has no files, too many files, a
    /// disallowed, empty or oversized file, a non-importable table type, or
    /// mappings onto unknown fields.
    pub async fn submit(&self, request: BulkUploadRequest) -> Result<JobId> {
        self.check_request(&request)?;

        let job_id = Uuid::new_v4();
        let state: SharedSnapshot = Arc::new(RwLock::new(JobSnapshot::new(job_id, &request)));
        let cancel = self.shutdown.child_token();
        let (done_tx, done_rx) = watch::channel(false);

        self.active.write().await.insert(
            job_id,
            ActiveJob {
                state: Arc::clone(&state),
                cancel: cancel.clone(),
                done: done_rx,
            },
        );
        info!(
            job_id = %job_id,
            files = request.files.len(),
            label = request.label.as_deref().unwrap_or("-"),
            "Bulk upload job submitted"
        );

        let engine = Arc::clone(&self.engine);
        let active = Arc::clone(&self.active);
        let history = Arc::clone(&self.history);
        let history_limit = self.engine.settings().history_limit.max(1);
        tokio::spawn(async move {
            let run_state = Arc::clone(&state);
            let run = tokio::spawn(async move {
                engine.run_job(job_id, &request, run_state, cancel).await
            });
            let snapshot = match run.await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    error!(job_id = %job_id, error = %err, "Bulk upload job aborted");
                    let mut snapshot = state.read().await.clone();
                    snapshot.status = JobStatus::Failed;
                    snapshot.phase = Phase::Finished;
                    snapshot.current_file = None;
                    snapshot.finished_at = Some(Utc::now());
                    snapshot.message =
                        Some("An unexpected error occurred while processing the job".to_string());
                    snapshot
                }
            };

            {
                let mut history = history.write().await;
                history.push_back(snapshot);
                while history.len() > history_limit {
                    history.pop_front();
                }
            }
            active.write().await.remove(&job_id);
            done_tx.send_replace(true);
        });

        Ok(job_id)
    }

    /// Current snapshot of a running or recently finished job.
    pub async fn status(&self, job_id: JobId) -> Option<JobSnapshot> {
        let state = self
            .active
            .read()
            .await
            .get(&job_id)
            .map(|job| Arc::clone(&job.state));
        if let Some(state) = state {
            return Some(state.read().await.clone());
        }
        self.finished(job_id).await
    }

    /// Requests cancellation. Returns `false` if the job is not running.
    pub async fn cancel(&self, job_id: JobId) -> bool {
        let active = self.active.read().await;
        let Some(job) = active.get(&job_id) else {
            return false;
        };
        job.cancel.cancel();
        info!(job_id = %job_id, "Bulk upload job cancellation requested");
        true
    }

    /// Waits for a job to finish and returns its final snapshot.
    pub async fn wait(&self, job_id: JobId) -> Option<JobSnapshot> {
        let done = self
            .active
            .read()
            .await
            .get(&job_id)
            .map(|job| job.done.clone());
        if let Some(mut done) = done {
            // An error means the sender is gone, which also means finished.
            let _ = done.wait_for(|finished| *finished).await;
        }
        self.finished(job_id).await
    }

    /// Ids of jobs still running.
    pub async fn active_jobs(&self) -> Vec<JobId> {
        self.active.read().await.keys().copied().collect()
    }

    /// Finished jobs, oldest first.
    pub async fn history(&self) -> Vec<JobSnapshot> {
        self.history.read().await.iter().cloned().collect()
    }

    /// Cancels every running job and waits for all of them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let pending: Vec<_> = self
            .active
            .read()
            .await
            .values()
            .map(|job| job.done.clone())
            .collect();
        info!(jobs = pending.len(), "Shutting down job manager");
        for mut done in pending {
            let _ = done.wait_for(|finished| *finished).await;
        }
    }

    async fn finished(&self, job_id: JobId) -> Option<JobSnapshot> {
        self.history
            .read()
            .await
            .iter()
            .rev()
            .find(|snapshot| snapshot.job_id == job_id)
            .cloned()
    }

    fn check_request(&self, request: &BulkUploadRequest) -> Result<()> {
        let settings = self.engine.settings();
        if request.files.is_empty() {
            return Err(CamsError::validation("At least one file is required"));
        }
        if request.files.len() > settings.max_files_per_job {
            return Err(CamsError::validation(format!(
                "At most {} files may be uploaded per job, got {}",
                settings.max_files_per_job,
                request.files.len()
            )));
        }

        for file in &request.files {
            let allowed = file
                .extension()
                .is_some_and(|ext| settings.is_extension_allowed(ext));
            if !allowed || file.format().is_none() {
                return Err(CamsError::validation(format!(
                    "File type of '{}' is not allowed (allowed: {})",
                    file.name,
                    settings.allowed_extensions.join(", ")
                )));
            }
            if file.size() == 0 {
                return Err(CamsError::validation(format!("File '{}' is empty", file.name)));
            }
            if file.size() > settings.max_file_size_bytes {
                return Err(CamsError::validation(format!(
                    "File '{}' is {} bytes, the limit is {} bytes",
                    file.name,
                    file.size(),
                    settings.max_file_size_bytes
                )));
            }
        }

        let schema = match request.table_type {
            Some(table_type) if !table_type.is_known() => {
                return Err(CamsError::validation(format!(
                    "Cannot import into table type '{table_type}'"
                )));
            }
            Some(table_type) => table_type.schema(),
            None => None,
        };
        for field in request.column_mappings.values() {
            let known = match schema {
                Some(schema) => schema.field(field).is_some(),
                None => SCHEMAS.iter().any(|s| s.field(field).is_some()),
            };
            if !known {
                let target = request
                    .table_type
                    .map_or_else(|| "any table type".to_string(), |t: TableType| t.to_string());
                return Err(CamsError::validation(format!(
                    "Mapped field '{field}' does not exist in {target}"
                )));
            }
        }
        Ok(())
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::config::IngestionSettings;
    use crate::ingest::job::{FileStatus, UploadFile};
    use crate::ingest::progress::NullProgressReporter;
    use crate::ingest::repository::{IngestionRepository, InMemoryRepository, RowOutcome};
    use crate::ingest::row::Record;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn manager_with(
        settings: IngestionSettings,
        repository: Arc<dyn IngestionRepository>,
    ) -> JobManager {
        JobManager::new(Arc::new(BatchIngestionEngine::new(
            Arc::new(settings),
            repository,
            Arc::new(NullProgressReporter),
        )))
    }

    fn manager() -> JobManager {
        manager_with(IngestionSettings::default(), Arc::new(InMemoryRepository::new()))
    }

    fn users_csv(rows: usize) -> String {
        let mut csv = String::from("email,first_name,last_name\n");
        for i in 0..rows {
            csv.push_str(&format!("user{i}@example.com,First{i},Last{i}\n"));
        }
        csv
    }

    /// Blocks each batch until released.
    struct GatedRepository {
        entered: Notify,
        release: Notify,
        inner: InMemoryRepository,
    }

    #[async_trait]
    impl IngestionRepository for GatedRepository {
        async fn save_batch(&self, table_type: TableType, rows: &[Record]) -> Result<Vec<RowOutcome>> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.save_batch(table_type, rows).await
        }

        async fn exists(&self, table_type: TableType, unique_key: &str) -> Result<bool> {
            self.inner.exists(table_type, unique_key).await
        }
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let manager = manager();
        let job_id = manager
            .submit(BulkUploadRequest::new(vec![UploadFile::new("users.csv", users_csv(3))]))
            .await
            .unwrap();

        let snapshot = manager.wait(job_id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.succeeded_rows(), 3);
        assert!((snapshot.percentage() - 100.0).abs() < 1e-9);
        assert_eq!(manager.status(job_id).await.unwrap(), snapshot);
        assert!(manager.active_jobs().await.is_empty());
        assert!(!manager.cancel(job_id).await);
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_requests() {
        let manager = manager();
        let cases = [
            BulkUploadRequest::new(vec![]),
            BulkUploadRequest::new(vec![UploadFile::new("users.exe", "x")]),
            BulkUploadRequest::new(vec![UploadFile::new("users.csv", "")]),
            BulkUploadRequest::new(vec![UploadFile::new("users.csv", "a\n1\n")])
                .with_table_type(TableType::Mixed),
            BulkUploadRequest::new(vec![UploadFile::new("users.csv", "a\n1\n")])
                .with_mapping("a", "shoe_size"),
            BulkUploadRequest::new(vec![UploadFile::new("users.csv", "a\n1\n")])
                .with_table_type(TableType::Roles)
                .with_mapping("a", "email"),
        ];
        for request in cases {
            let err = manager.submit(request).await.unwrap_err();
            assert!(matches!(err, CamsError::Validation { .. }), "{err}");
        }
        assert!(manager.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_size_and_count_limits() {
        let settings = IngestionSettings {
            max_files_per_job: 1,
            ..IngestionSettings::default()
        }
        .with_max_file_size_bytes(10);
        let manager = manager_with(settings, Arc::new(InMemoryRepository::new()));

        let too_big = BulkUploadRequest::new(vec![UploadFile::new("users.csv", users_csv(1))]);
        assert!(manager.submit(too_big).await.is_err());
        let too_many = BulkUploadRequest::new(vec![
            UploadFile::new("a.csv", "a\n1\n"),
            UploadFile::new("b.csv", "a\n1\n"),
        ]);
        assert!(manager.submit(too_many).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_at_batch_boundary() {
        let repository = Arc::new(GatedRepository {
            entered: Notify::new(),
            release: Notify::new(),
            inner: InMemoryRepository::new(),
        });
        let manager = manager_with(IngestionSettings::default(), repository.clone());

        // 30 rows use batches of 25, so there are two batches
        let job_id = manager
            .submit(BulkUploadRequest::new(vec![UploadFile::new("users.csv", users_csv(30))]))
            .await
            .unwrap();
        repository.entered.notified().await;
        assert!(manager.cancel(job_id).await);
        repository.release.notify_one();

        let snapshot = manager.wait(job_id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert_eq!(snapshot.files[0].status, FileStatus::Cancelled);
        assert_eq!(snapshot.succeeded_rows(), 25);
        assert!(snapshot.processed_rows() <= snapshot.total_rows());
        assert_eq!(repository.inner.count(TableType::Users).await, 25);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let settings = IngestionSettings {
            history_limit: 2,
            ..IngestionSettings::default()
        };
        let manager = manager_with(settings, Arc::new(InMemoryRepository::new()));
        let mut ids = Vec::new();
        for i in 0..3 {
            let csv = format!("email,first_name,last_name\nu{i}@example.com,A,B\n");
            let id = manager
                .submit(BulkUploadRequest::new(vec![UploadFile::new("users.csv", csv)]))
                .await
                .unwrap();
            manager.wait(id).await.unwrap();
            ids.push(id);
        }
        let history = manager.history().await;
        assert_eq!(history.len(), 2);
        assert!(manager.status(ids[0]).await.is_none());
        assert!(manager.status(ids[2]).await.is_some());
    }
}
