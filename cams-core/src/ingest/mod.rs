//! Bulk ingestion of user, role, application and assignment data.
//!
//! Uploaded files (CSV, JSON, XML, Excel) flow through one sequential
//! pipeline per job:
//!
//! 1. parse into a `ParsedTable` with 1-based source row numbers
//! 2. detect the table type, or take it from an override or explicit mappings
//! 3. validate each row and drop duplicates
//! 4. persist in sized batches with bounded retries
//!
//! `JobManager` is the entry point: it validates submissions, runs each job
//! on its own task and exposes snapshots, cancellation and a bounded history.
//!
//! # Example
//! ```no_run
//! use cams_core::ingest::{
//!     BatchIngestionEngine, BulkUploadRequest, IngestionSettings, InMemoryRepository,
//!     JobManager, TracingProgressReporter, UploadFile,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> cams_core::Result<()> {
//! let engine = BatchIngestionEngine::new(
//!     Arc::new(IngestionSettings::default()),
//!     Arc::new(InMemoryRepository::new()),
//!     Arc::new(TracingProgressReporter),
//! );
//! let manager = JobManager::new(Arc::new(engine));
//! let job_id = manager
//!     .submit(BulkUploadRequest::new(vec![UploadFile::from_path("users.csv").await?]))
//!     .await?;
//! let snapshot = manager.wait(job_id).await;
//! # Ok(())
//! # }
//! ```

mod config;
mod detector;
mod engine;
mod job;
mod manager;
/// CSV, JSON, XML and Excel parsers
pub mod parser;
mod progress;
mod repository;
mod row;
mod schema;
mod validator;

pub use config::{BatchTier, IngestionSettings};
pub use detector::{DetectedTableInfo, TableTypeDetector};
pub use engine::{BatchIngestionEngine, SharedSnapshot};
pub use job::{
    BulkUploadError, BulkUploadRequest, ErrorCategory, FileReport, FileStatus, JobId, JobSnapshot,
    JobStatus, Phase, UploadFile,
};
pub use manager::JobManager;
pub use parser::{ParseOptions, parse};
pub use progress::{
    ChannelProgressReporter, NullProgressReporter, ProgressEvent, ProgressReporter,
    TracingProgressReporter,
};
pub use repository::{InMemoryRepository, IngestionRepository, JsonLinesRepository, RowOutcome};
pub use row::{FileFormat, ParsedRow, ParsedTable, Record, default_delimiter};
pub use schema::{
    AllowedValues, ColumnMapping, FieldPattern, FieldSpec, SCHEMAS, TableSchema, TableType,
    normalize,
};
pub use validator::{FieldError, FieldErrorKind, RowValidator};
