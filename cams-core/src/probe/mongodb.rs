//! MongoDB probe: `ping` against the admin database.

use super::{ConnectionProbe, ProbeOutcome, ProbeSettings, bounded, wrong_descriptor};
use crate::connection::ConnectionDescriptor;
use crate::models::DataSourceType;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Pings MongoDB through the official driver.
#[derive(Debug, Clone)]
pub struct MongoProbe {
    settings: ProbeSettings,
    cancel: CancellationToken,
}

impl MongoProbe {
    /// Creates a probe bounded by `settings` and observing `cancel`.
    pub fn new(settings: ProbeSettings, cancel: CancellationToken) -> Self {
        Self { settings, cancel }
    }
}

#[async_trait]
impl ConnectionProbe for MongoProbe {
    async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ProbeOutcome {
        let ConnectionDescriptor::ConnectionString(d) = descriptor else {
            return wrong_descriptor("MongoDB", descriptor);
        };
        if d.data_source_type != DataSourceType::MongoDb {
            return wrong_descriptor("MongoDB", descriptor);
        }
        let attempt = ping(d.value.expose(), &self.settings);
        bounded(descriptor, &self.settings, &self.cancel, attempt).await
    }
}

#[cfg(feature = "mongodb")]
async fn ping(uri: &str, settings: &ProbeSettings) -> Result<String, String> {
    use mongodb::bson::doc;
    use mongodb::options::ClientOptions;

    let mut options = ClientOptions::parse(uri)
        .await
        .map_err(|e| format!("Invalid MongoDB connection string: {e}"))?;
    options.connect_timeout = Some(settings.connect_timeout());
    options.server_selection_timeout = Some(settings.connect_timeout());
    options.app_name = Some(settings.user_agent.clone());

    let client = mongodb::Client::with_options(options)
        .map_err(|e| format!("Failed to create MongoDB client: {e}"))?;
    let result = client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map(|_| "Connection successful".to_string())
        .map_err(|e| format!("Ping failed: {e}"));
    client.shutdown().await;
    result
}

#[cfg(not(feature = "mongodb"))]
async fn ping(_uri: &str, _settings: &ProbeSettings) -> Result<String, String> {
    Err("MongoDB support not compiled in (enable the `mongodb` feature)".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::FileDescriptor;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_rejects_non_mongo_descriptors() {
        let descriptor = ConnectionDescriptor::File(FileDescriptor {
            data_source_type: DataSourceType::Json,
            path: PathBuf::from("users.json"),
            delimiter: ',',
            encoding: "utf-8".to_string(),
            has_header: true,
            sheet_name: None,
        });
        let outcome = MongoProbe::new(ProbeSettings::default(), CancellationToken::new())
            .test_connection(&descriptor)
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("MongoDB probe cannot test"));
    }
}
