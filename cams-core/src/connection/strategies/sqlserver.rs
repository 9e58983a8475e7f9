//! SQL Server strategy producing ADO-style connection strings.

use super::helpers::{
    KeyValueBuilder, connect_timeout, database, endpoint, ensure_supported, password,
    require_azure, require_field, require_host, require_secret, require_username, resolve_port,
    username,
};
use crate::Result;
use crate::connection::{
    ConnectionDescriptor, ConnectionSource, ConnectionStrategy, ConnectionStringDescriptor,
    ConnectionStringDialect,
};
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};

/// Builds `Server=host,port;Database=...` strings for SQL Server and Azure SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerStrategy;

impl ConnectionStrategy for SqlServerStrategy {
    fn data_source_type(&self) -> DataSourceType {
        DataSourceType::SqlServer
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        let host = require_host(source)?;
        let port = resolve_port(source)?;

        let mut kv = KeyValueBuilder::new();
        // Named instances (host\INSTANCE) are resolved by the browser service.
        if host.contains('\\') && source.port.is_none() {
            kv.push("Server", host);
        } else {
            kv.push("Server", format!("{host},{port}"));
        }
        kv.push_opt("Database", database(source));

        match source.authentication_type {
            AuthenticationType::UsernamePassword => {
                kv.push("User Id", require_username(source)?)
                    .push("Password", password(source));
            }
            AuthenticationType::WindowsIntegrated => {
                kv.push("Integrated Security", "SSPI");
            }
            AuthenticationType::AzureAdPassword => {
                kv.push("Authentication", "Active Directory Password")
                    .push("User Id", require_username(source)?)
                    .push("Password", password(source));
            }
            AuthenticationType::AzureAdIntegrated => {
                kv.push("Authentication", "Active Directory Integrated");
            }
            AuthenticationType::AzureAdServicePrincipal => {
                let azure = require_azure(source)?;
                let client_id = require_field(source, azure.client_id.as_ref(), "a client id")?;
                let secret = require_secret(source, azure.client_secret.as_ref(), "a client secret")?;
                kv.push("Authentication", "Active Directory Service Principal")
                    .push("User Id", client_id)
                    .push("Password", secret);
            }
            AuthenticationType::AzureAdManagedIdentity => {
                let client_id = source
                    .azure
                    .as_ref()
                    .and_then(|azure| azure.client_id.as_deref())
                    .or(username(source));
                kv.push("Authentication", "Active Directory Managed Identity")
                    .push_opt("User Id", client_id);
            }
            other => {
                return Err(CamsError::unsupported_authentication(
                    self.data_source_type(),
                    other,
                ));
            }
        }

        let azure_auth = matches!(
            source.authentication_type,
            AuthenticationType::AzureAdPassword
                | AuthenticationType::AzureAdIntegrated
                | AuthenticationType::AzureAdServicePrincipal
                | AuthenticationType::AzureAdManagedIdentity
        );
        kv.push(
            "Encrypt",
            if source.use_ssl || azure_auth { "True" } else { "False" },
        )
        .push(
            "TrustServerCertificate",
            if source.trust_server_certificate { "True" } else { "False" },
        )
        .push("Connect Timeout", connect_timeout(source).to_string());

        Ok(ConnectionDescriptor::ConnectionString(ConnectionStringDescriptor {
            data_source_type: self.data_source_type(),
            authentication_type: source.authentication_type,
            dialect: ConnectionStringDialect::KeyValue,
            value: kv.build().into(),
            endpoint: Some(endpoint(host, port)),
        }))
    }
}
