//! Upload requests, job state and error reporting types.

use super::detector::DetectedTableInfo;
use super::parser::ParseOptions;
use super::row::FileFormat;
use super::schema::TableType;
use crate::Result;
use crate::error::CamsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of one ingestion job.
pub type JobId = Uuid;

/// Status of one file, and of a job as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Queued,
    Processing,
    Completed,
    CompletedWithErrors,
    Failed,
    Cancelled,
}

impl FileStatus {
    /// Whether no further transitions can happen.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithErrors | Self::Failed | Self::Cancelled
        )
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Job-level status; shares the file status lifecycle.
pub type JobStatus = FileStatus;

/// Pipeline stage of the file being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Phase {
    Queued,
    Parsing,
    Detecting,
    Validating,
    /// Persisting batch `batch` (1-based) of `batches`
    Processing { batch: usize, batches: usize },
    Finished,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => f.write_str("Queued"),
            Self::Parsing => f.write_str("Parsing file"),
            Self::Detecting => f.write_str("Detecting table type"),
            Self::Validating => f.write_str("Validating rows"),
            Self::Processing { batch, batches } => {
                write!(f, "Processing batch {batch} of {batches}")
            }
            Self::Finished => f.write_str("Finished"),
        }
    }
}

/// Where in the pipeline a problem was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing, malformed or disallowed field values
    Validation,
    /// Unique key already present
    Duplicate,
    /// Storage failure after retries
    System,
    /// Unreadable file or unusable columns
    Processing,
}

/// One recorded ingestion problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUploadError {
    /// File the error belongs to
    pub file_name: String,
    /// 1-based source position, absent for file-level errors
    pub row_number: Option<usize>,
    /// Schema field at fault, when known
    pub field_name: Option<String>,
    /// Caller-facing description; never carries storage internals
    pub message: String,
    /// Pipeline stage that rejected the row
    pub category: ErrorCategory,
    /// Raw row values so callers can fix and resubmit
    pub raw_row: Option<BTreeMap<String, String>>,
}

/// One file of an upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// File name; its extension selects the parser
    pub name: String,
    /// Raw bytes, shared with the parser task
    pub content: Arc<[u8]>,
}

impl UploadFile {
    /// Wraps in-memory content.
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let content: Vec<u8> = content.into();
        Self {
            name: name.into(),
            content: Arc::from(content),
        }
    }

    /// Reads a file from disk.
    ///
    /// # Errors
    /// Returns `Io` if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| CamsError::io(format!("Failed to read {}", path.display()), e))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(name, content))
    }

    /// Extension of the file name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name).extension().and_then(|e| e.to_str())
    }

    /// Parser format implied by the extension.
    pub fn format(&self) -> Option<FileFormat> {
        FileFormat::from_path(&self.name)
    }

    /// Content length in bytes.
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// A bulk upload submission.
#[derive(Debug, Clone, Default)]
pub struct BulkUploadRequest {
    /// Files in processing order
    pub files: Vec<UploadFile>,
    /// Forces the table type instead of detecting it
    pub table_type: Option<TableType>,
    /// Explicit `column -> field` mappings
    pub column_mappings: BTreeMap<String, String>,
    /// Overrides `IngestionSettings::ignore_errors`
    pub ignore_errors: Option<bool>,
    /// Overrides `IngestionSettings::continue_on_error`
    pub continue_on_error: Option<bool>,
    /// Delimiter, encoding, header and sheet options
    pub parse_options: ParseOptions,
    /// Free-form caller metadata echoed in snapshots
    pub label: Option<String>,
}

impl BulkUploadRequest {
    /// Request for `files` with every option at its default.
    pub fn new(files: Vec<UploadFile>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    /// Skips detection and treats every file as `table_type`.
    pub fn with_table_type(mut self, table_type: TableType) -> Self {
        self.table_type = Some(table_type);
        self
    }

    /// Maps a source column onto a schema field.
    pub fn with_mapping(mut self, column: impl Into<String>, field: impl Into<String>) -> Self {
        self.column_mappings.insert(column.into(), field.into());
        self
    }

    /// Whether invalid rows are skipped instead of failing the file.
    pub fn with_ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = Some(ignore_errors);
        self
    }

    /// Whether later files run after a failed one.
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = Some(continue_on_error);
        self
    }

    /// Replaces the parse options.
    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }
}

/// Per-file progress and outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    /// Name of the uploaded file
    pub file_name: String,
    /// Lifecycle status
    pub status: FileStatus,
    /// Resolved table type, once detected or forced
    pub table_type: Option<TableType>,
    /// Detection details, absent when the type was forced
    pub detection: Option<DetectedTableInfo>,
    /// Rows parsed from the file
    pub total_rows: usize,
    /// Rows validated or persisted so far
    pub processed_rows: usize,
    /// Rows stored
    pub succeeded_rows: usize,
    /// Rows rejected by validation or storage
    pub failed_rows: usize,
    /// Every recorded problem, in row order
    pub errors: Vec<BulkUploadError>,
    /// File-level outcome message
    pub message: Option<String>,
}

impl FileReport {
    /// Report for a file that has not started.
    pub fn queued(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            status: FileStatus::Queued,
            table_type: None,
            detection: None,
            total_rows: 0,
            processed_rows: 0,
            succeeded_rows: 0,
            failed_rows: 0,
            errors: Vec::new(),
            message: None,
        }
    }

    pub(crate) fn finish(&mut self, status: FileStatus, message: impl Into<String>) {
        self.status = status;
        self.message = Some(message.into());
    }
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job identifier
    pub job_id: JobId,
    /// Caller label copied from the request
    pub label: Option<String>,
    /// Aggregate status
    pub status: JobStatus,
    /// Stage of the current file
    pub phase: Phase,
    /// Index of the file being processed
    pub current_file: Option<usize>,
    /// One report per submitted file, in order
    pub files: Vec<FileReport>,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Time the job reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
    /// Job-level outcome message
    pub message: Option<String>,
}

impl JobSnapshot {
    /// Queued snapshot with one report per file.
    pub fn new(job_id: JobId, request: &BulkUploadRequest) -> Self {
        Self {
            job_id,
            label: request.label.clone(),
            status: JobStatus::Queued,
            phase: Phase::Queued,
            current_file: None,
            files: request
                .files
                .iter()
                .map(|f| FileReport::queued(f.name.clone()))
                .collect(),
            created_at: Utc::now(),
            finished_at: None,
            message: None,
        }
    }

    /// Rows in files parsed so far.
    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|f| f.total_rows).sum()
    }

    /// Rows handled so far across files.
    pub fn processed_rows(&self) -> usize {
        self.files.iter().map(|f| f.processed_rows).sum()
    }

    /// Rows stored across files.
    pub fn succeeded_rows(&self) -> usize {
        self.files.iter().map(|f| f.succeeded_rows).sum()
    }

    /// Rows rejected across files.
    pub fn failed_rows(&self) -> usize {
        self.files.iter().map(|f| f.failed_rows).sum()
    }

    /// Every error across files, file by file.
    pub fn errors(&self) -> impl Iterator<Item = &BulkUploadError> {
        self.files.iter().flat_map(|f| f.errors.iter())
    }

    /// Number of recorded errors.
    pub fn error_count(&self) -> usize {
        self.files.iter().map(|f| f.errors.len()).sum()
    }

    /// Progress across files: finished files count fully, the current file
    /// by its processed share.
    pub fn percentage(&self) -> f64 {
        if self.status.is_terminal() {
            return 100.0;
        }
        if self.files.is_empty() {
            return 0.0;
        }
        let done: f64 = self
            .files
            .iter()
            .map(|f| {
                if f.status.is_terminal() {
                    1.0
                } else if f.total_rows > 0 {
                    f.processed_rows as f64 / f.total_rows as f64
                } else {
                    0.0
                }
            })
            .sum();
        (done / self.files.len() as f64 * 100.0).min(100.0)
    }

    /// Job status implied by the files' statuses.
    pub(crate) fn resolve_status(&self) -> JobStatus {
        if self.files.iter().any(|f| f.status == FileStatus::Cancelled)
            && self.files.iter().all(|f| f.status != FileStatus::Failed)
        {
            return JobStatus::Cancelled;
        }
        if self.files.iter().all(|f| f.status == FileStatus::Completed) {
            JobStatus::Completed
        } else if self
            .files
            .iter()
            .all(|f| matches!(f.status, FileStatus::Failed | FileStatus::Cancelled))
        {
            JobStatus::Failed
        } else {
            JobStatus::CompletedWithErrors
        }
    }
}
