//! Rendering and saving of command results.

use anyhow::Context;
use cams_core::ProbeOutcome;
use cams_core::ingest::{JobSnapshot, JobStatus};
use std::fmt::Write as _;
use std::path::Path;
use std::process::ExitCode;

/// Errors listed per file before the rest are summarized.
const MAX_LISTED_ERRORS: usize = 20;

/// Saves a job snapshot as pretty JSON.
///
/// # Errors
/// Fails if the snapshot cannot be serialized or the file written.
pub async fn write_report(snapshot: &JobSnapshot, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize job report")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write to {}", path.display()))
}

/// Human-readable job summary.
pub fn render_snapshot(snapshot: &JobSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Job {}: {}", snapshot.job_id, snapshot.status);
    for file in &snapshot.files {
        let table = file
            .table_type
            .map_or_else(|| "-".to_string(), |t| t.to_string());
        let _ = writeln!(
            out,
            "  {} [{}] table={} rows={} saved={} failed={}",
            file.file_name,
            file.status,
            table,
            file.total_rows,
            file.succeeded_rows,
            file.failed_rows
        );
        if let Some(message) = &file.message {
            let _ = writeln!(out, "    {message}");
        }
        for error in file.errors.iter().take(MAX_LISTED_ERRORS) {
            let row = error
                .row_number
                .map_or_else(|| "file".to_string(), |n| format!("row {n}"));
            let field = error
                .field_name
                .as_deref()
                .map_or_else(String::new, |f| format!(" {f}:"));
            let _ = writeln!(out, "    - {row}{field} {}", error.message);
        }
        if file.errors.len() > MAX_LISTED_ERRORS {
            let _ = writeln!(
                out,
                "    ... {} more errors",
                file.errors.len() - MAX_LISTED_ERRORS
            );
        }
    }
    if let Some(message) = &snapshot.message {
        let _ = writeln!(out, "{message}");
    }
    out
}

/// One-line verdict for a connectivity test.
pub fn render_probe(outcome: &ProbeOutcome) -> String {
    let verdict = if outcome.success { "OK" } else { "FAILED" };
    format!("[{verdict}] {} ({} ms)", outcome.message, outcome.elapsed_ms)
}

/// 0 when clean, 2 when some rows or files failed, 1 otherwise.
pub fn exit_code_for(status: JobStatus) -> ExitCode {
    match status {
        JobStatus::Completed => ExitCode::SUCCESS,
        JobStatus::CompletedWithErrors => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}
