//! Ingestion configuration.
//!
//! Everything the pipeline consumes as read-only settings: batch sizing,
//! retries, limits, detection thresholds and role names.

use crate::Result;
use crate::error::CamsError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Row-count tier: files with at most `max_rows` data rows use `batch_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTier {
    /// Largest row count the tier covers
    pub max_rows: usize,
    /// Rows per batch inside the tier
    pub batch_size: usize,
}

impl BatchTier {
    /// Tier of `batch_size` for files up to `max_rows` rows.
    pub const fn new(max_rows: usize, batch_size: usize) -> Self {
        Self {
            max_rows,
            batch_size,
        }
    }
}

/// Bulk ingestion settings.
///
/// # Example
/// ```rust
/// use cams_core::ingest::IngestionSettings;
///
/// let settings = IngestionSettings::default().with_retry_count(1);
/// assert_eq!(settings.batch_size_for(80), 25);
/// assert_eq!(settings.batch_size_for(50_000), 1_000);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    /// Ascending row-count tiers
    pub batch_tiers: Vec<BatchTier>,
    /// Batch size for files larger than the last tier
    pub max_batch_size: usize,
    /// Extra attempts after a failed batch
    pub retry_count: u32,
    /// Pause between attempts of one batch, in milliseconds
    pub retry_delay_ms: u64,
    /// Upper bound for one batch persistence call
    pub batch_timeout_secs: u64,
    /// Minimum spacing of progress events during validation
    pub progress_interval_ms: u64,
    /// Lowercase extensions without the dot
    pub allowed_extensions: Vec<String>,
    /// Largest accepted upload, per file
    pub max_file_size_bytes: u64,
    /// Most files accepted in one request
    pub max_files_per_job: usize,
    /// Role names accepted in role columns (case-insensitive)
    pub valid_roles: Vec<String>,
    /// Detection scores below this are `Unknown`
    pub min_detection_confidence: f64,
    /// Schemas scoring within this margin of the best are ambiguous
    pub ambiguity_margin: f64,
    /// Rows sampled by the table type detector
    pub detection_sample_size: usize,
    /// Finished jobs kept for status queries
    pub history_limit: usize,
    /// Persist valid rows even when some rows fail validation
    pub ignore_errors: bool,
    /// Keep going after a failed batch or file
    pub continue_on_error: bool,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            batch_tiers: vec![
                BatchTier::new(100, 25),
                BatchTier::new(1_000, 100),
                BatchTier::new(10_000, 500),
            ],
            max_batch_size: 1_000,
            retry_count: 3,
            retry_delay_ms: 500,
            batch_timeout_secs: 30,
            progress_interval_ms: 500,
            allowed_extensions: ["csv", "tsv", "json", "xml", "xlsx", "xls"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_file_size_bytes: 50 * 1024 * 1024,
            max_files_per_job: 10,
            valid_roles: ["Admin", "Manager", "User", "Viewer", "Auditor"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_detection_confidence: 0.3,
            ambiguity_margin: 0.05,
            detection_sample_size: 20,
            history_limit: 100,
            ignore_errors: true,
            continue_on_error: true,
        }
    }
}

impl IngestionSettings {
    /// Default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the extra attempts after a failed batch.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Sets the pause between batch attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the upper bound of one batch save.
    pub fn with_batch_timeout_secs(mut self, seconds: u64) -> Self {
        self.batch_timeout_secs = seconds;
        self
    }

    /// Replaces the batch size tiers.
    pub fn with_batch_tiers(mut self, tiers: Vec<BatchTier>, max_batch_size: usize) -> Self {
        self.batch_tiers = tiers;
        self.max_batch_size = max_batch_size;
        self
    }

    /// Replaces the accepted role names.
    pub fn with_valid_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Whether invalid rows are skipped instead of failing the file.
    pub fn with_ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = ignore_errors;
        self
    }

    /// Whether processing continues after a failed batch or file.
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Sets the per-file size limit.
    pub fn with_max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }

    /// Sets the detection threshold, clamped to `0.0..=1.0`.
    pub fn with_min_detection_confidence(mut self, confidence: f64) -> Self {
        if !(0.0..=1.0).contains(&confidence) {
            tracing::warn!(
                confidence,
                "min_detection_confidence clamped to valid range [0.0, 1.0]"
            );
        }
        self.min_detection_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Batch size for a file with `rows` data rows.
    pub fn batch_size_for(&self, rows: usize) -> usize {
        self.batch_tiers
            .iter()
            .find(|tier| rows <= tier.max_rows)
            .map_or(self.max_batch_size, |tier| tier.batch_size)
    }

    /// Pause between batch attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Upper bound of one batch save.
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    /// Minimum spacing of validation progress events.
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Whether `extension` (with or without a leading dot) may be uploaded.
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    /// Checks the settings for internal consistency.
    ///
    /// # Errors
    /// Returns `Configuration` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let mut previous = 0;
        for tier in &self.batch_tiers {
            if tier.batch_size == 0 {
                return Err(CamsError::configuration("batch tier sizes must be positive"));
            }
            if tier.max_rows <= previous && previous != 0 {
                return Err(CamsError::configuration(
                    "batch tiers must be in ascending max_rows order",
                ));
            }
            previous = tier.max_rows;
        }
        if self.max_batch_size == 0 {
            return Err(CamsError::configuration("max_batch_size must be positive"));
        }
        if self.batch_timeout_secs == 0 {
            return Err(CamsError::configuration("batch_timeout_secs must be positive"));
        }
        if self.allowed_extensions.is_empty() {
            return Err(CamsError::configuration(
                "allowed_extensions must name at least one extension",
            ));
        }
        if self.max_file_size_bytes == 0 || self.max_files_per_job == 0 {
            return Err(CamsError::configuration(
                "file size and file count limits must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_detection_confidence) {
            return Err(CamsError::configuration(format!(
                "min_detection_confidence must be between 0.0 and 1.0, got {}",
                self.min_detection_confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.ambiguity_margin) {
            return Err(CamsError::configuration(format!(
                "ambiguity_margin must be between 0.0 and 1.0, got {}",
                self.ambiguity_margin
            )));
        }
        if self.detection_sample_size == 0 {
            return Err(CamsError::configuration("detection_sample_size must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers() {
        let settings = IngestionSettings::default();
        assert_eq!(settings.batch_size_for(0), 25);
        assert_eq!(settings.batch_size_for(100), 25);
        assert_eq!(settings.batch_size_for(101), 100);
        assert_eq!(settings.batch_size_for(10_000), 500);
        assert_eq!(settings.batch_size_for(10_001), 1_000);
    }

    #[test]
    fn test_custom_tiers() {
        let settings =
            IngestionSettings::default().with_batch_tiers(vec![BatchTier::new(10, 2)], 5);
        assert_eq!(settings.batch_size_for(7), 2);
        assert_eq!(settings.batch_size_for(11), 5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let unordered = IngestionSettings::default()
            .with_batch_tiers(vec![BatchTier::new(100, 10), BatchTier::new(50, 5)], 20);
        assert!(unordered.validate().is_err());

        let zero = IngestionSettings::default().with_batch_tiers(vec![BatchTier::new(10, 0)], 5);
        assert!(zero.validate().is_err());

        let mut confidence = IngestionSettings::default();
        confidence.min_detection_confidence = 1.5;
        assert!(confidence.validate().is_err());
    }

    #[test]
    fn test_confidence_builder_clamps() {
        let settings = IngestionSettings::default().with_min_detection_confidence(2.0);
        assert!((settings.min_detection_confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_extension_check() {
        let settings = IngestionSettings::default();
        assert!(settings.is_extension_allowed("CSV"));
        assert!(settings.is_extension_allowed(".xlsx"));
        assert!(settings.is_extension_allowed("tsv"));
        assert!(!settings.is_extension_allowed("exe"));
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings: IngestionSettings =
            serde_json::from_str(r#"{"retry_count": 0, "valid_roles": ["Owner"]}"#).unwrap();
        assert_eq!(settings.retry_count, 0);
        assert_eq!(settings.valid_roles, vec!["Owner".to_string()]);
        assert_eq!(settings.history_limit, 100);
    }
}
