//! SQLite strategy producing `sqlite://` URLs for sqlx.

use super::helpers::{database, ensure_supported, option};
use crate::Result;
use crate::connection::{
    ConnectionDescriptor, ConnectionSource, ConnectionStrategy, ConnectionStringDescriptor,
    ConnectionStringDialect,
};
use crate::error::CamsError;
use crate::models::DataSourceType;

/// Embedded database; the path comes from the file settings, the database
/// field, or a `sqlite://` / `file://` URL, in that order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteStrategy;

fn resolve_path(source: &ConnectionSource) -> Result<String> {
    let from_file = source
        .file
        .as_ref()
        .and_then(|f| f.path.as_deref())
        .filter(|p| !p.trim().is_empty());
    if let Some(path) = from_file.or(database(source)) {
        return Ok(path.to_string());
    }
    if let Some(url) = source.url.as_deref() {
        if let Some(rest) = url.strip_prefix("sqlite://") {
            return Ok(rest.split('?').next().unwrap_or_default().to_string());
        }
        if let Ok(parsed) = url::Url::parse(url)
            && parsed.scheme() == "file"
            && let Ok(path) = parsed.to_file_path()
        {
            return Ok(path.to_string_lossy().into_owned());
        }
    }
    Err(CamsError::invalid_source("SQLite requires a database file path"))
}

impl ConnectionStrategy for SqliteStrategy {
    fn data_source_type(&self) -> DataSourceType {
        DataSourceType::Sqlite
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        let path = resolve_path(source)?;
        if path.is_empty() {
            return Err(CamsError::invalid_source("SQLite requires a database file path"));
        }
        let mode = option(source, "mode").unwrap_or("ro");
        let value = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{path}?mode={mode}")
        };

        Ok(ConnectionDescriptor::ConnectionString(ConnectionStringDescriptor {
            data_source_type: DataSourceType::Sqlite,
            authentication_type: source.authentication_type,
            dialect: ConnectionStringDialect::Url,
            value: value.into(),
            endpoint: None,
        }))
    }
}
