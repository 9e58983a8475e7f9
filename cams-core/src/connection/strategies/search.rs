//! Elasticsearch / OpenSearch strategy.

use super::helpers::{database, ensure_supported};
use super::http_api::{base_url, http_auth};
use crate::Result;
use crate::connection::{
    ConnectionDescriptor, ConnectionSource, ConnectionStrategy, SearchClusterDescriptor,
};
use crate::models::DataSourceType;

/// Elasticsearch and OpenSearch clusters.
#[derive(Debug, Clone, Copy)]
pub struct SearchClusterStrategy {
    flavor: DataSourceType,
}

impl SearchClusterStrategy {
    /// Elasticsearch clusters.
    pub fn elasticsearch() -> Self {
        Self {
            flavor: DataSourceType::ElasticSearch,
        }
    }

    /// OpenSearch clusters.
    pub fn opensearch() -> Self {
        Self {
            flavor: DataSourceType::OpenSearch,
        }
    }
}

impl ConnectionStrategy for SearchClusterStrategy {
    fn data_source_type(&self) -> DataSourceType {
        self.flavor
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        Ok(ConnectionDescriptor::Search(SearchClusterDescriptor {
            data_source_type: self.flavor,
            base_url: base_url(source)?,
            index: database(source).map(str::to_string),
            // Amazon OpenSearch Service signs requests for the `es` service.
            auth: http_auth(source, "es")?,
            accept_invalid_certs: source.trust_server_certificate,
        }))
    }
}
