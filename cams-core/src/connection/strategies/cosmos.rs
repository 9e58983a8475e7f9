//! Azure Cosmos DB strategy.

use super::helpers::{
    KeyValueBuilder, database, endpoint, ensure_supported, require_azure, require_field,
    require_host, require_secret, resolve_port,
};
use crate::Result;
use crate::connection::{
    ConnectionDescriptor, ConnectionSource, ConnectionStrategy, ConnectionStringDescriptor,
    ConnectionStringDialect, Endpoint,
};
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};

/// Azure Cosmos DB `AccountEndpoint=...` connection strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosmosStrategy;

/// Account endpoint from the URL field, else from host and port.
fn account_endpoint(source: &ConnectionSource) -> Result<(String, Endpoint)> {
    if let Some(raw) = source.url.as_deref().filter(|u| !u.trim().is_empty()) {
        let url = url::Url::parse(raw)
            .map_err(|e| CamsError::invalid_source(format!("Invalid Cosmos DB endpoint: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| CamsError::invalid_source("Cosmos DB endpoint has no host"))?;
        let port = url.port_or_known_default().unwrap_or(443);
        return Ok((raw.to_string(), endpoint(host, port)));
    }
    let host = require_host(source)?;
    let port = resolve_port(source)?;
    Ok((format!("https://{host}:{port}/"), endpoint(host, port)))
}

impl ConnectionStrategy for CosmosStrategy {
    fn data_source_type(&self) -> DataSourceType {
        DataSourceType::CosmosDb
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        let (account, endpoint) = account_endpoint(source)?;

        let mut kv = KeyValueBuilder::new();
        kv.push("AccountEndpoint", &account);
        match source.authentication_type {
            AuthenticationType::ApiKey => {
                kv.push(
                    "AccountKey",
                    require_secret(source, source.api_key.as_ref(), "an account key")?,
                );
            }
            AuthenticationType::AzureAdServicePrincipal => {
                let azure = require_azure(source)?;
                kv.push("TenantId", require_field(source, azure.tenant_id.as_ref(), "a tenant id")?)
                    .push("ClientId", require_field(source, azure.client_id.as_ref(), "a client id")?)
                    .push(
                        "ClientSecret",
                        require_secret(source, azure.client_secret.as_ref(), "a client secret")?,
                    );
            }
            AuthenticationType::AzureAdManagedIdentity => {
                kv.push_opt(
                    "ManagedIdentityClientId",
                    source.azure.as_ref().and_then(|a| a.client_id.as_deref()),
                );
            }
            other => {
                return Err(CamsError::unsupported_authentication(self.data_source_type(), other));
            }
        }
        kv.push_opt("Database", database(source));

        Ok(ConnectionDescriptor::ConnectionString(ConnectionStringDescriptor {
            data_source_type: self.data_source_type(),
            authentication_type: source.authentication_type,
            dialect: ConnectionStringDialect::KeyValue,
            value: kv.build().into(),
            endpoint: Some(endpoint),
        }))
    }
}
