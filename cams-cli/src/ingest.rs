//! The `ingest` command.

use crate::{CliSettings, IngestArgs};
use anyhow::Context;
use cams_core::ingest::{
    BatchIngestionEngine, BulkUploadRequest, InMemoryRepository, IngestionRepository,
    JobManager, JobSnapshot, JsonLinesRepository, ParseOptions, TracingProgressReporter,
    UploadFile,
};
use std::sync::Arc;
use tracing::info;

/// Builds the upload request from command-line arguments.
///
/// # Errors
/// Fails if an input file cannot be read.
pub async fn build_request(args: &IngestArgs) -> anyhow::Result<BulkUploadRequest> {
    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(UploadFile::from_path(path).await?);
    }

    let mut request = BulkUploadRequest::new(files).with_parse_options(ParseOptions {
        delimiter: args.delimiter,
        encoding: args.encoding.clone(),
        has_header: !args.no_header,
        sheet_name: args.sheet.clone(),
    });
    if let Some(table_type) = args.table_type {
        request = request.with_table_type(table_type);
    }
    for (column, field) in &args.mappings {
        request = request.with_mapping(column.clone(), field.clone());
    }
    if args.strict {
        request = request.with_ignore_errors(false);
    }
    if args.stop_on_error {
        request = request.with_continue_on_error(false);
    }
    request.label.clone_from(&args.label);
    Ok(request)
}

/// Runs one ingestion job to completion and returns its final snapshot.
///
/// # Errors
/// Fails if the output directory cannot be opened or the request is
/// rejected. Row and file problems are reported in the snapshot.
pub async fn run(args: &IngestArgs, settings: &CliSettings) -> anyhow::Result<JobSnapshot> {
    let request = build_request(args).await?;

    let repository: Arc<dyn IngestionRepository> = if args.dry_run {
        info!("Dry run, nothing will be written");
        Arc::new(InMemoryRepository::new())
    } else {
        Arc::new(
            JsonLinesRepository::open(&args.output_dir)
                .await
                .with_context(|| format!("Cannot use output directory {}", args.output_dir.display()))?,
        )
    };

    let engine = BatchIngestionEngine::new(
        Arc::new(settings.ingestion.clone()),
        repository,
        Arc::new(TracingProgressReporter),
    );
    let manager = JobManager::new(Arc::new(engine));
    let job_id = manager.submit(request).await?;
    let snapshot = manager
        .wait(job_id)
        .await
        .with_context(|| format!("Job {job_id} finished without a snapshot"))?;

    if let Some(path) = &args.report {
        crate::output::write_report(&snapshot, path).await?;
        info!(report = %path.display(), "Job report written");
    }
    Ok(snapshot)
}
