//! Oracle strategy producing ODP-style connection strings with a TNS descriptor.

use super::helpers::{
    KeyValueBuilder, connect_timeout, endpoint, ensure_supported, option, password,
    require_database, require_host, require_username, resolve_port,
};
use crate::Result;
use crate::connection::{
    ConnectionDescriptor, ConnectionSource, ConnectionStrategy, ConnectionStringDescriptor,
    ConnectionStringDialect,
};
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};

/// Oracle ODP-style connection strings with a TNS descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleStrategy;

fn tns_descriptor(protocol: &str, host: &str, port: u16, service_name: &str) -> String {
    format!(
        "(DESCRIPTION=(ADDRESS=(PROTOCOL={protocol})(HOST={host})(PORT={port}))(CONNECT_DATA=(SERVICE_NAME={service_name})))"
    )
}

impl ConnectionStrategy for OracleStrategy {
    fn data_source_type(&self) -> DataSourceType {
        DataSourceType::Oracle
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        let host = require_host(source)?;
        let port = resolve_port(source)?;
        let service_name = require_database(source, "service name")?;
        let wallet = source.authentication_type == AuthenticationType::OracleWallet;
        let protocol = if source.use_ssl || wallet { "TCPS" } else { "TCP" };

        let mut kv = KeyValueBuilder::new();
        kv.push_raw("Data Source", &tns_descriptor(protocol, host, port, service_name));

        match source.authentication_type {
            AuthenticationType::UsernamePassword => {
                kv.push("User Id", require_username(source)?)
                    .push("Password", password(source));
            }
            AuthenticationType::OracleWallet => {
                let location = option(source, "wallet_location")
                    .or_else(|| {
                        source
                            .certificate
                            .as_ref()
                            .and_then(|c| c.certificate_path.as_deref())
                    })
                    .ok_or_else(|| {
                        CamsError::invalid_source("Oracle wallet authentication requires a wallet location")
                    })?;
                kv.push("User Id", "/").push("Wallet_Location", location);
            }
            AuthenticationType::Kerberos => {
                kv.push("User Id", "/");
            }
            other => {
                return Err(CamsError::unsupported_authentication(self.data_source_type(), other));
            }
        }
        kv.push("Connection Timeout", connect_timeout(source).to_string());

        Ok(ConnectionDescriptor::ConnectionString(ConnectionStringDescriptor {
            data_source_type: self.data_source_type(),
            authentication_type: source.authentication_type,
            dialect: ConnectionStringDialect::KeyValue,
            value: kv.build().into(),
            endpoint: Some(endpoint(host, port)),
        }))
    }
}
