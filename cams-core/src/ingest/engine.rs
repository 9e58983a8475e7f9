//! Sequential per-job pipeline: parse, detect, validate and persist.

use super::config::IngestionSettings;
use super::detector::{DetectedTableInfo, TableTypeDetector};
use super::job::{
    BulkUploadError, BulkUploadRequest, ErrorCategory, FileReport, FileStatus, JobId, JobSnapshot,
    JobStatus, Phase, UploadFile,
};
use super::parser;
use super::progress::{ProgressEvent, ProgressReporter};
use super::repository::{IngestionRepository, RowOutcome};
use super::row::{ParsedRow, ParsedTable, Record};
use super::schema::{ColumnMapping, SCHEMAS, TableSchema, TableType};
use super::validator::RowValidator;
use crate::Result;
use crate::error::CamsError;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Live state of one job, readable while it runs.
pub type SharedSnapshot = Arc<RwLock<JobSnapshot>>;

const GENERIC_FAILURE: &str = "An unexpected error occurred while processing the file";

/// How a file left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Finished,
    Cancelled,
}

enum BatchFailure {
    Cancelled,
    Exhausted { attempts: u32 },
}

/// Per-run context threaded through the pipeline.
struct JobContext<'a> {
    job_id: JobId,
    request: &'a BulkUploadRequest,
    state: &'a SharedSnapshot,
    cancel: &'a CancellationToken,
    ignore_errors: bool,
    continue_on_error: bool,
}

/// Runs bulk upload jobs against a repository.
///
/// One job is one sequential pipeline. Files are handled in submission
/// order, batches in increasing index order, and cancellation is observed
/// between rows during validation and between batches during persistence.
pub struct BatchIngestionEngine {
    settings: Arc<IngestionSettings>,
    repository: Arc<dyn IngestionRepository>,
    reporter: Arc<dyn ProgressReporter>,
    detector: TableTypeDetector,
    validator: RowValidator,
}

impl BatchIngestionEngine {
    /// Creates an engine that persists through `repository` and publishes
    /// through `reporter`.
    pub fn new(
        settings: Arc<IngestionSettings>,
        repository: Arc<dyn IngestionRepository>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            detector: TableTypeDetector::from_settings(&settings),
            validator: RowValidator::new(settings.valid_roles.iter().cloned()),
            settings,
            repository,
            reporter,
        }
    }

    /// Settings the engine was built with.
    pub fn settings(&self) -> &IngestionSettings {
        &self.settings
    }

    /// Runs a request to completion under a fresh job id.
    pub async fn run(&self, request: &BulkUploadRequest) -> JobSnapshot {
        let job_id = Uuid::new_v4();
        let state = Arc::new(RwLock::new(JobSnapshot::new(job_id, request)));
        self.run_job(job_id, request, state, CancellationToken::new())
            .await
    }

    /// Runs a job, keeping `state` current, and returns the final snapshot.
    ///
    /// Never fails: file-level problems become file statuses and unexpected
    /// errors become `Failed` files with a generic message.
    pub async fn run_job(
        &self,
        job_id: JobId,
        request: &BulkUploadRequest,
        state: SharedSnapshot,
        cancel: CancellationToken,
    ) -> JobSnapshot {
        let ctx = JobContext {
            job_id,
            request,
            state: &state,
            cancel: &cancel,
            ignore_errors: request.ignore_errors.unwrap_or(self.settings.ignore_errors),
            continue_on_error: request
                .continue_on_error
                .unwrap_or(self.settings.continue_on_error),
        };

        state.write().await.status = JobStatus::Processing;
        info!(
            job_id = %job_id,
            files = request.files.len(),
            ignore_errors = ctx.ignore_errors,
            continue_on_error = ctx.continue_on_error,
            "Bulk upload job started"
        );
        self.publish(&ctx).await;

        let mut cancelled = false;
        let mut aborted = false;
        for (index, file) in request.files.iter().enumerate() {
            if !cancelled && cancel.is_cancelled() {
                cancelled = true;
            }
            if cancelled || aborted {
                let message = if cancelled {
                    "Job cancelled before this file was processed"
                } else {
                    "Skipped after an earlier file failed"
                };
                self.update_file(&ctx, index, |report| {
                    report.finish(FileStatus::Cancelled, message);
                })
                .await;
                continue;
            }

            {
                let mut snapshot = state.write().await;
                snapshot.current_file = Some(index);
                snapshot.files[index].status = FileStatus::Processing;
            }

            let mut report = FileReport::queued(file.name.clone());
            report.status = FileStatus::Processing;
            let outcome = match self.process_file(&ctx, index, file, &mut report).await {
                Ok(outcome) => outcome,
                Err(CamsError::Cancelled { .. }) => {
                    report.finish(FileStatus::Cancelled, "Cancelled");
                    FileOutcome::Cancelled
                }
                Err(err) => {
                    error!(
                        job_id = %job_id,
                        file = %file.name,
                        error = %err,
                        "Unexpected error while processing file"
                    );
                    report.finish(FileStatus::Failed, GENERIC_FAILURE);
                    report.errors.push(file_error(&file.name, GENERIC_FAILURE, ErrorCategory::System));
                    FileOutcome::Finished
                }
            };
            let status = report.status;
            self.store_report(&ctx, index, report).await;

            info!(job_id = %job_id, file = %file.name, status = %status, "File finished");
            match outcome {
                FileOutcome::Cancelled => cancelled = true,
                FileOutcome::Finished if status == FileStatus::Failed && !ctx.continue_on_error => {
                    warn!(job_id = %job_id, file = %file.name, "Stopping job after file failure");
                    aborted = true;
                }
                FileOutcome::Finished => {}
            }
        }

        let snapshot = {
            let mut snapshot = state.write().await;
            snapshot.status = if cancelled {
                JobStatus::Cancelled
            } else if aborted {
                JobStatus::Failed
            } else {
                snapshot.resolve_status()
            };
            snapshot.phase = Phase::Finished;
            snapshot.current_file = None;
            snapshot.finished_at = Some(Utc::now());
            snapshot.message = Some(format!(
                "{} of {} rows saved, {} failed, {} errors",
                snapshot.succeeded_rows(),
                snapshot.total_rows(),
                snapshot.failed_rows(),
                snapshot.error_count()
            ));
            snapshot.clone()
        };

        info!(
            job_id = %job_id,
            status = %snapshot.status,
            total = snapshot.total_rows(),
            succeeded = snapshot.succeeded_rows(),
            failed = snapshot.failed_rows(),
            "Bulk upload job finished"
        );
        self.publish(&ctx).await;
        snapshot
    }

    async fn process_file(
        &self,
        ctx: &JobContext<'_>,
        index: usize,
        file: &UploadFile,
        report: &mut FileReport,
    ) -> Result<FileOutcome> {
        let Some(format) = file.format() else {
            fail(report, format!("Unsupported file type: {}", file.name), ErrorCategory::Validation);
            return Ok(FileOutcome::Finished);
        };

        self.set_phase(ctx, Phase::Parsing).await;
        let content = Arc::clone(&file.content);
        let options = ctx.request.parse_options.for_file(&file.name);
        let parsed = tokio::task::spawn_blocking(move || parser::parse(&content, format, &options))
            .await
            .map_err(|e| CamsError::parse(format.to_string(), format!("parser task failed: {e}")))?;
        let table = match parsed {
            Ok(table) => table,
            Err(err) => {
                warn!(job_id = %ctx.job_id, file = %file.name, error = %err, "File could not be parsed");
                fail(report, err.public_message(), ErrorCategory::Processing);
                return Ok(FileOutcome::Finished);
            }
        };
        report.total_rows = table.len();
        self.sync(ctx, index, report).await;
        if ctx.cancel.is_cancelled() {
            report.finish(FileStatus::Cancelled, "Cancelled before detection");
            return Ok(FileOutcome::Cancelled);
        }

        self.set_phase(ctx, Phase::Detecting).await;
        let (schema, mapping, detection) = match self.resolve_schema(ctx.request, &table) {
            Ok(resolved) => resolved,
            Err((message, detection)) => {
                report.detection = detection;
                fail(report, message, ErrorCategory::Validation);
                return Ok(FileOutcome::Finished);
            }
        };
        report.table_type = Some(schema.table_type);
        report.detection = Some(detection);
        debug!(
            job_id = %ctx.job_id,
            file = %file.name,
            table_type = %schema.table_type,
            rows = table.len(),
            "Schema resolved"
        );

        if table.is_empty() {
            report.finish(FileStatus::Completed, "File contains no data rows");
            return Ok(FileOutcome::Finished);
        }

        self.set_phase(ctx, Phase::Validating).await;
        let Some(valid) = self
            .validate_rows(ctx, index, file, &table, schema, &mapping, report)
            .await?
        else {
            return Ok(FileOutcome::Cancelled);
        };

        let invalid = report
            .errors
            .iter()
            .any(|e| e.category == ErrorCategory::Validation);
        if invalid && !ctx.ignore_errors {
            let rejected = report.failed_rows;
            report.failed_rows = report.total_rows;
            report.processed_rows = report.total_rows;
            report.finish(
                FileStatus::Failed,
                format!("{rejected} rows failed validation; nothing was saved"),
            );
            return Ok(FileOutcome::Finished);
        }

        self.persist(ctx, index, file, schema.table_type, &valid, report)
            .await
    }

    /// Validates every row, records validation and duplicate errors, and
    /// returns the rows to persist. `None` means the job was cancelled.
    #[allow(clippy::too_many_arguments)]
    async fn validate_rows(
        &self,
        ctx: &JobContext<'_>,
        index: usize,
        file: &UploadFile,
        table: &ParsedTable,
        schema: &TableSchema,
        mapping: &ColumnMapping,
        report: &mut FileReport,
    ) -> Result<Option<Vec<(usize, Record)>>> {
        let interval = self.settings.progress_interval();
        let mut last_publish = Instant::now();
        let mut seen = HashSet::new();
        let mut valid = Vec::with_capacity(table.len());

        for row in &table.rows {
            if ctx.cancel.is_cancelled() {
                report.finish(FileStatus::Cancelled, "Cancelled during validation");
                return Ok(None);
            }

            let field_errors = self.validator.validate(row, schema, mapping);
            if !field_errors.is_empty() {
                for field_error in field_errors {
                    report.errors.push(BulkUploadError {
                        file_name: file.name.clone(),
                        row_number: Some(row.row_number),
                        field_name: Some(field_error.field),
                        message: field_error.message,
                        category: ErrorCategory::Validation,
                        raw_row: Some(row.to_map()),
                    });
                }
                report.failed_rows += 1;
                report.processed_rows += 1;
                continue;
            }

            let record = mapping.project(row);
            let key = schema.unique_key_of(&record);
            let duplicate = if !seen.insert(key.clone()) {
                Some("Duplicate of an earlier row in this upload")
            } else if self.repository.exists(schema.table_type, &key).await? {
                Some("A matching record already exists")
            } else {
                None
            };
            if let Some(message) = duplicate {
                report.errors.push(duplicate_error(file, row, schema, message));
                report.failed_rows += 1;
                report.processed_rows += 1;
                continue;
            }

            valid.push((row.row_number, record));
            if last_publish.elapsed() >= interval {
                self.sync(ctx, index, report).await;
                self.publish(ctx).await;
                last_publish = Instant::now();
            }
        }

        debug!(
            job_id = %ctx.job_id,
            file = %file.name,
            valid = valid.len(),
            rejected = report.failed_rows,
            "Validation finished"
        );
        Ok(Some(valid))
    }

    async fn persist(
        &self,
        ctx: &JobContext<'_>,
        index: usize,
        file: &UploadFile,
        table_type: TableType,
        valid: &[(usize, Record)],
        report: &mut FileReport,
    ) -> Result<FileOutcome> {
        let batch_size = self.settings.batch_size_for(report.total_rows).max(1);
        let batches = valid.len().div_ceil(batch_size);

        for (batch_index, chunk) in valid.chunks(batch_size).enumerate() {
            let batch = batch_index + 1;
            if ctx.cancel.is_cancelled() {
                report.finish(
                    FileStatus::Cancelled,
                    format!("Cancelled after {batch_index} of {batches} batches"),
                );
                return Ok(FileOutcome::Cancelled);
            }
            self.set_phase(ctx, Phase::Processing { batch, batches }).await;

            let records: Vec<Record> = chunk.iter().map(|(_, record)| record.clone()).collect();
            match self.save_with_retry(ctx, file, batch, table_type, &records).await {
                Ok(outcomes) => {
                    let outcomes = outcomes.into_iter().map(Some).chain(std::iter::repeat(None));
                    for ((row_number, record), outcome) in chunk.iter().zip(outcomes) {
                        let reason = match outcome {
                            Some(RowOutcome::Saved) => {
                                report.succeeded_rows += 1;
                                continue;
                            }
                            Some(RowOutcome::Rejected(reason)) => reason,
                            None => "No result returned for this row".to_string(),
                        };
                        report.failed_rows += 1;
                        report.errors.push(BulkUploadError {
                            file_name: file.name.clone(),
                            row_number: Some(*row_number),
                            field_name: None,
                            message: reason,
                            category: ErrorCategory::Processing,
                            raw_row: Some(record.clone()),
                        });
                    }
                }
                Err(BatchFailure::Cancelled) => {
                    report.finish(
                        FileStatus::Cancelled,
                        format!("Cancelled while retrying batch {batch} of {batches}"),
                    );
                    return Ok(FileOutcome::Cancelled);
                }
                Err(BatchFailure::Exhausted { attempts }) => {
                    let message = format!("Batch {batch} could not be saved after {attempts} attempts");
                    for (row_number, record) in chunk {
                        report.errors.push(BulkUploadError {
                            file_name: file.name.clone(),
                            row_number: Some(*row_number),
                            field_name: None,
                            message: message.clone(),
                            category: ErrorCategory::System,
                            raw_row: Some(record.clone()),
                        });
                    }
                    report.failed_rows += chunk.len();
                    if !ctx.continue_on_error {
                        report.processed_rows += chunk.len();
                        report.finish(FileStatus::Failed, message);
                        return Ok(FileOutcome::Finished);
                    }
                }
            }

            report.processed_rows += chunk.len();
            self.sync(ctx, index, report).await;
            self.publish(ctx).await;
        }

        let status = if report.errors.is_empty() {
            FileStatus::Completed
        } else {
            FileStatus::CompletedWithErrors
        };
        report.finish(
            status,
            format!(
                "{} of {} rows saved",
                report.succeeded_rows, report.total_rows
            ),
        );
        Ok(FileOutcome::Finished)
    }

    /// Saves one batch with bounded retries. Cancellation is honoured only
    /// between attempts so a batch is never abandoned mid-write.
    async fn save_with_retry(
        &self,
        ctx: &JobContext<'_>,
        file: &UploadFile,
        batch: usize,
        table_type: TableType,
        records: &[Record],
    ) -> std::result::Result<Vec<RowOutcome>, BatchFailure> {
        let attempts = self.settings.retry_count.saturating_add(1);
        let timeout = self.settings.batch_timeout();

        for attempt in 1..=attempts {
            match tokio::time::timeout(timeout, self.repository.save_batch(table_type, records)).await {
                Ok(Ok(outcomes)) => {
                    debug!(
                        job_id = %ctx.job_id,
                        file = %file.name,
                        batch,
                        rows = records.len(),
                        attempt,
                        "Batch saved"
                    );
                    return Ok(outcomes);
                }
                Ok(Err(err)) => warn!(
                    job_id = %ctx.job_id,
                    file = %file.name,
                    batch,
                    attempt,
                    error = %err,
                    "Batch save failed"
                ),
                Err(_) => warn!(
                    job_id = %ctx.job_id,
                    file = %file.name,
                    batch,
                    attempt,
                    timeout_secs = timeout.as_secs(),
                    "Batch save timed out"
                ),
            }

            if attempt < attempts {
                tokio::select! {
                    () = ctx.cancel.cancelled() => return Err(BatchFailure::Cancelled),
                    () = tokio::time::sleep(self.settings.retry_delay()) => {}
                }
            }
        }
        Err(BatchFailure::Exhausted { attempts })
    }

    /// Picks the schema and column mapping for a parsed file.
    ///
    /// Explicit mappings win, then a table type override, then detection.
    fn resolve_schema(
        &self,
        request: &BulkUploadRequest,
        table: &ParsedTable,
    ) -> std::result::Result<
        (&'static TableSchema, ColumnMapping, DetectedTableInfo),
        (String, Option<DetectedTableInfo>),
    > {
        let sample = table.sample(self.settings.detection_sample_size);
        let detection = self.detector.detect(&table.columns, sample);

        if !request.column_mappings.is_empty() {
            if let Some(column) = request
                .column_mappings
                .keys()
                .find(|column| !table.columns.contains(*column))
            {
                return Err((
                    format!("Mapped column '{column}' is not present in the file"),
                    Some(detection),
                ));
            }
            let table_type = match request.table_type {
                Some(table_type) => table_type,
                None => match best_schema_for_mapping(request) {
                    Some(table_type) => table_type,
                    None => {
                        return Err((
                            "Column mappings do not target any known table type".to_string(),
                            Some(detection),
                        ));
                    }
                },
            };
            let Some(schema) = table_type.schema() else {
                return Err((format!("Cannot import into table type '{table_type}'"), Some(detection)));
            };
            if let Some(field) = request
                .column_mappings
                .values()
                .find(|field| schema.field(field).is_none())
            {
                return Err((
                    format!("'{field}' is not a field of {table_type}"),
                    Some(detection),
                ));
            }

            let mut mapping = ColumnMapping::from_column_pairs(
                request
                    .column_mappings
                    .iter()
                    .map(|(column, field)| (column.as_str(), field.as_str())),
            );
            mapping.fill_from(&self.detector.mapping_for(table_type, &table.columns));
            return Ok((schema, mapping, detection));
        }

        if let Some(table_type) = request.table_type {
            let Some(schema) = table_type.schema() else {
                return Err((format!("Cannot import into table type '{table_type}'"), Some(detection)));
            };
            let mapping = self.detector.mapping_for(table_type, &table.columns);
            return Ok((schema, mapping, detection));
        }

        match detection.table_type {
            TableType::Unknown => Err((
                format!(
                    "Could not determine the table type (confidence {:.2} is below {:.2}); supply a table type or column mappings",
                    detection.confidence, self.settings.min_detection_confidence
                ),
                Some(detection),
            )),
            TableType::Mixed => Err((
                "Columns match several table types; supply a table type or column mappings"
                    .to_string(),
                Some(detection),
            )),
            table_type => match table_type.schema() {
                Some(schema) => {
                    let mapping = self.detector.mapping_for(table_type, &table.columns);
                    Ok((schema, mapping, detection))
                }
                None => Err((format!("Cannot import into table type '{table_type}'"), Some(detection))),
            },
        }
    }

    async fn set_phase(&self, ctx: &JobContext<'_>, phase: Phase) {
        ctx.state.write().await.phase = phase;
        self.publish(ctx).await;
    }

    async fn sync(&self, ctx: &JobContext<'_>, index: usize, report: &FileReport) {
        let report = report.clone();
        self.update_file(ctx, index, move |slot| *slot = report).await;
    }

    async fn store_report(&self, ctx: &JobContext<'_>, index: usize, report: FileReport) {
        self.update_file(ctx, index, move |slot| *slot = report).await;
    }

    async fn update_file<F>(&self, ctx: &JobContext<'_>, index: usize, update: F)
    where
        F: FnOnce(&mut FileReport),
    {
        if let Some(report) = ctx.state.write().await.files.get_mut(index) {
            update(report);
        }
    }

    async fn publish(&self, ctx: &JobContext<'_>) {
        let event = ProgressEvent::from_snapshot(&*ctx.state.read().await);
        if let Err(err) = self.reporter.publish(ctx.job_id, &event).await {
            warn!(job_id = %ctx.job_id, error = %err, "Failed to publish progress");
        }
    }
}

/// Table type whose fields the mapping targets most; ties go to the schema
/// with more required fields covered.
fn best_schema_for_mapping(request: &BulkUploadRequest) -> Option<TableType> {
    SCHEMAS
        .iter()
        .map(|schema| {
            let targeted = request
                .column_mappings
                .values()
                .filter(|field| schema.field(field).is_some())
                .count();
            let required = schema
                .required_fields()
                .filter(|f| request.column_mappings.values().any(|v| v == f.name))
                .count();
            (schema.table_type, targeted, required)
        })
        .filter(|(_, targeted, _)| *targeted > 0)
        .max_by_key(|(_, targeted, required)| (*targeted, *required))
        .map(|(table_type, _, _)| table_type)
}

fn fail(report: &mut FileReport, message: impl Into<String>, category: ErrorCategory) {
    let message = message.into();
    report
        .errors
        .push(file_error(&report.file_name, &message, category));
    report.failed_rows = report.total_rows;
    report.processed_rows = report.total_rows;
    report.finish(FileStatus::Failed, message);
}

fn file_error(file_name: &str, message: &str, category: ErrorCategory) -> BulkUploadError {
    BulkUploadError {
        file_name: file_name.to_string(),
        row_number: None,
        field_name: None,
        message: message.to_string(),
        category,
        raw_row: None,
    }
}

fn duplicate_error(
    file: &UploadFile,
    row: &ParsedRow,
    schema: &TableSchema,
    message: &str,
) -> BulkUploadError {
    BulkUploadError {
        file_name: file.name.clone(),
        row_number: Some(row.row_number),
        field_name: Some(schema.unique_key.join("+")),
        message: message.to_string(),
        category: ErrorCategory::Duplicate,
        raw_row: Some(row.to_map()),
    }
}
