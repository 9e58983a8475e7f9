//! Local file strategy for CSV, JSON, XML and Excel sources.

use super::helpers::ensure_supported;
use crate::Result;
use crate::connection::{ConnectionDescriptor, ConnectionSource, ConnectionStrategy, FileDescriptor};
use crate::error::CamsError;
use crate::ingest::default_delimiter;
use crate::models::DataSourceType;
use std::path::PathBuf;

/// Local files, addressed by path or `file://` URL.
#[derive(Debug, Clone, Copy)]
pub struct FileStrategy {
    flavor: DataSourceType,
}

impl FileStrategy {
    /// CSV and TSV files.
    pub fn csv() -> Self {
        Self {
            flavor: DataSourceType::Csv,
        }
    }

    /// JSON files.
    pub fn json() -> Self {
        Self {
            flavor: DataSourceType::Json,
        }
    }

    /// XML files.
    pub fn xml() -> Self {
        Self {
            flavor: DataSourceType::Xml,
        }
    }

    /// Excel and OpenDocument spreadsheets.
    pub fn excel() -> Self {
        Self {
            flavor: DataSourceType::Excel,
        }
    }
}

/// Explicit path first, then a `file://` URL.
fn resolve_path(source: &ConnectionSource) -> Result<PathBuf> {
    let explicit = source
        .file
        .as_ref()
        .and_then(|f| f.path.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty());
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }
    if let Some(raw) = source.url.as_deref().filter(|u| !u.trim().is_empty()) {
        let url = url::Url::parse(raw)
            .map_err(|e| CamsError::invalid_source(format!("Invalid file URL: {}", e)))?;
        if url.scheme() != "file" {
            return Err(CamsError::invalid_source("File sources only accept file:// URLs"));
        }
        return url
            .to_file_path()
            .map_err(|()| CamsError::invalid_source("File URL does not name a local path"));
    }
    Err(CamsError::invalid_source(format!(
        "{} source requires a file path or file:// URL",
        source.data_source_type
    )))
}

impl ConnectionStrategy for FileStrategy {
    fn data_source_type(&self) -> DataSourceType {
        self.flavor
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        let path = resolve_path(source)?;
        let settings = source.file.clone().unwrap_or_default();
        let delimiter = settings.delimiter.unwrap_or_else(|| default_delimiter(&path));

        Ok(ConnectionDescriptor::File(FileDescriptor {
            data_source_type: self.flavor,
            path,
            delimiter,
            encoding: settings.encoding.unwrap_or_else(|| "utf-8".to_string()),
            has_header: settings.has_header,
            sheet_name: settings.sheet_name,
        }))
    }
}
