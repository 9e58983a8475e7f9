//! Live connectivity probes.
//!
//! A probe takes a built `ConnectionDescriptor`, opens a scoped connection,
//! runs the cheapest round trip the backend offers and releases everything
//! before returning. Probes never fail: every outcome, including timeouts
//! and cancellation, is reported as a `ProbeOutcome`.
//!
//! # Security
//! - Diagnostic messages are scrubbed of every secret the descriptor carries
//! - Connection strings are never logged; only `redacted()` summaries are

mod file;
mod http;
mod mongodb;
mod redis;
mod sql;
mod tcp;

pub use file::FileProbe;
pub use http::HttpProbe;
pub use mongodb::MongoProbe;
pub use redis::RedisProbe;
pub use sql::SqlProbe;
pub use tcp::TcpProbe;

use crate::Result;
use crate::connection::ConnectionDescriptor;
use crate::error::CamsError;
use crate::models::DataSourceType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Result of one connectivity test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Whether the round trip completed
    pub success: bool,
    /// Human-readable result, scrubbed of secrets
    pub message: String,
    /// Wall time of the attempt in milliseconds
    pub elapsed_ms: u64,
}

impl ProbeOutcome {
    /// Successful outcome.
    pub fn success(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: true,
            message: message.into(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Failed outcome.
    pub fn failure(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            message: message.into(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Probe configuration.
///
/// # Example
/// ```rust
/// use cams_core::probe::ProbeSettings;
///
/// let settings = ProbeSettings::default().with_connect_timeout_secs(5);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Upper bound for one connection attempt, in seconds
    pub connect_timeout_secs: u64,
    /// Health endpoint appended to search cluster URLs
    pub search_health_path: String,
    /// User agent sent by HTTP probes
    pub user_agent: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            search_health_path: "/_cluster/health".to_string(),
            user_agent: format!("cams-probe/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ProbeSettings {
    /// Sets the per-attempt timeout.
    pub fn with_connect_timeout_secs(mut self, seconds: u64) -> Self {
        self.connect_timeout_secs = seconds;
        self
    }

    /// Per-attempt timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validates the probe settings.
    ///
    /// # Errors
    /// Returns `Configuration` if the timeout is outside 1..=300 seconds.
    pub fn validate(&self) -> Result<()> {
        if !(1..=300).contains(&self.connect_timeout_secs) {
            return Err(CamsError::configuration(
                "connect_timeout_secs must be between 1 and 300",
            ));
        }
        if !self.search_health_path.starts_with('/') {
            return Err(CamsError::configuration(
                "search_health_path must start with '/'",
            ));
        }
        Ok(())
    }
}

/// Tests live connectivity for a descriptor.
#[async_trait]
pub trait ConnectionProbe: Send + Sync {
    /// Opens, exercises and closes one connection. Never errors.
    async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ProbeOutcome;
}

/// Runs one attempt under the timeout and cancellation token, then scrubs
/// the message of the descriptor's secrets.
pub(crate) async fn bounded<F>(
    descriptor: &ConnectionDescriptor,
    settings: &ProbeSettings,
    cancel: &CancellationToken,
    attempt: F,
) -> ProbeOutcome
where
    F: Future<Output = std::result::Result<String, String>>,
{
    let started = Instant::now();
    let timeout = settings.connect_timeout();
    let result = tokio::select! {
        () = cancel.cancelled() => Err("Connection test cancelled".to_string()),
        outcome = tokio::time::timeout(timeout, attempt) => match outcome {
            Ok(result) => result,
            Err(_) => Err(format!("Connection timed out after {}s", timeout.as_secs())),
        },
    };
    let elapsed = started.elapsed();

    match result {
        Ok(message) => {
            tracing::debug!(
                descriptor = %descriptor.redacted(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Connection test succeeded"
            );
            ProbeOutcome::success(descriptor.scrub(&message), elapsed)
        }
        Err(message) => {
            let message = descriptor.scrub(&message);
            tracing::warn!(
                descriptor = %descriptor.redacted(),
                elapsed_ms = elapsed.as_millis() as u64,
                error = %message,
                "Connection test failed"
            );
            ProbeOutcome::failure(message, elapsed)
        }
    }
}

pub(crate) fn wrong_descriptor(probe: &str, descriptor: &ConnectionDescriptor) -> ProbeOutcome {
    ProbeOutcome::failure(
        format!(
            "{probe} probe cannot test {} connections",
            descriptor.data_source_type()
        ),
        Duration::ZERO,
    )
}

/// Routes each descriptor to the probe that can exercise it.
#[derive(Debug, Clone, Default)]
pub struct ProbeDispatcher {
    settings: ProbeSettings,
    cancel: CancellationToken,
}

impl ProbeDispatcher {
    /// Creates a dispatcher with its own cancellation token.
    pub fn new(settings: ProbeSettings) -> Self {
        Self {
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token observed by every probe.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Settings handed to every probe.
    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Probes the descriptor with the matching implementation.
    pub async fn probe(&self, descriptor: &ConnectionDescriptor) -> ProbeOutcome {
        let settings = self.settings.clone();
        let cancel = self.cancel.clone();
        match descriptor {
            ConnectionDescriptor::ConnectionString(d) => match d.data_source_type {
                DataSourceType::PostgreSql
                | DataSourceType::Redshift
                | DataSourceType::CockroachDb
                | DataSourceType::MySql
                | DataSourceType::MariaDb
                | DataSourceType::Sqlite
                | DataSourceType::SqlServer => {
                    SqlProbe::new(settings, cancel).test_connection(descriptor).await
                }
                DataSourceType::MongoDb => {
                    MongoProbe::new(settings, cancel).test_connection(descriptor).await
                }
                DataSourceType::CosmosDb | DataSourceType::Snowflake => {
                    HttpProbe::new(settings, cancel).test_connection(descriptor).await
                }
                _ => TcpProbe::new(settings, cancel).test_connection(descriptor).await,
            },
            ConnectionDescriptor::Redis(_) => {
                RedisProbe::new(settings, cancel).test_connection(descriptor).await
            }
            ConnectionDescriptor::Search(_) | ConnectionDescriptor::Http(_) => {
                HttpProbe::new(settings, cancel).test_connection(descriptor).await
            }
            ConnectionDescriptor::Cassandra(_) | ConnectionDescriptor::Aws(_) => {
                TcpProbe::new(settings, cancel).test_connection(descriptor).await
            }
            ConnectionDescriptor::File(_) => {
                FileProbe::new(settings, cancel).test_connection(descriptor).await
            }
        }
    }
}

#[async_trait]
impl ConnectionProbe for ProbeDispatcher {
    async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ProbeOutcome {
        self.probe(descriptor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::FileDescriptor;
    use std::path::PathBuf;

    fn missing_file() -> ConnectionDescriptor {
        ConnectionDescriptor::File(FileDescriptor {
            data_source_type: DataSourceType::Csv,
            path: PathBuf::from("/definitely/not/here.csv"),
            delimiter: ',',
            encoding: "utf-8".to_string(),
            has_header: true,
            sheet_name: None,
        })
    }

    #[test]
    fn test_settings_validation() {
        assert!(ProbeSettings::default().validate().is_ok());
        assert!(ProbeSettings::default().with_connect_timeout_secs(0).validate().is_err());
        assert!(ProbeSettings::default().with_connect_timeout_secs(301).validate().is_err());
    }

    #[tokio::test]
    async fn test_bounded_reports_timeout() {
        let settings = ProbeSettings::default().with_connect_timeout_secs(1);
        let outcome = bounded(&missing_file(), &settings, &CancellationToken::new(), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("never".to_string())
        })
        .await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_bounded_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = bounded(&missing_file(), &ProbeSettings::default(), &cancel, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("never".to_string())
        })
        .await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Connection test cancelled");
    }

    #[tokio::test]
    async fn test_dispatcher_routes_files() {
        let outcome = ProbeDispatcher::default().probe(&missing_file()).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("not found"));
    }
}
