//! Snowflake strategy producing driver key-value strings.

use super::helpers::{
    KeyValueBuilder, database, endpoint, ensure_supported, option, password, require_field,
    require_host, require_secret, require_username, resolve_port, username,
};
use crate::Result;
use crate::connection::{
    ConnectionDescriptor, ConnectionSource, ConnectionStrategy, ConnectionStringDescriptor,
    ConnectionStringDialect,
};
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};
use crate::security::non_empty;

const SNOWFLAKE_DOMAIN: &str = ".snowflakecomputing.com";

/// Snowflake account connection strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnowflakeStrategy;

/// Returns (account identifier, fully qualified host).
fn account_and_host(source: &ConnectionSource) -> Result<(String, String)> {
    let host = require_host(source)?;
    let account = option(source, "account")
        .map(str::to_string)
        .unwrap_or_else(|| {
            host.strip_suffix(SNOWFLAKE_DOMAIN)
                .unwrap_or(host)
                .split('.')
                .next()
                .unwrap_or(host)
                .to_string()
        });
    let fqdn = if host.contains('.') {
        host.to_string()
    } else {
        format!("{host}{SNOWFLAKE_DOMAIN}")
    };
    Ok((account, fqdn))
}

impl ConnectionStrategy for SnowflakeStrategy {
    fn data_source_type(&self) -> DataSourceType {
        DataSourceType::Snowflake
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        let (account, host) = account_and_host(source)?;
        let port = resolve_port(source)?;

        let mut kv = KeyValueBuilder::new();
        kv.push("account", &account)
            .push("host", &host)
            .push("port", port.to_string());

        match source.authentication_type {
            AuthenticationType::UsernamePassword => {
                kv.push("user", require_username(source)?)
                    .push("password", password(source));
            }
            AuthenticationType::KeyPair => {
                let certificate = source.certificate.as_ref();
                let key_file = require_field(
                    source,
                    certificate.and_then(|c| c.key_path.as_ref()),
                    "a private key path",
                )?;
                kv.push("user", require_username(source)?)
                    .push("authenticator", "snowflake_jwt")
                    .push("private_key_file", key_file)
                    .push_opt(
                        "private_key_pwd",
                        certificate.and_then(|c| non_empty(c.key_password.as_ref())),
                    );
            }
            AuthenticationType::OAuth2 => {
                kv.push_opt("user", username(source))
                    .push("authenticator", "oauth")
                    .push(
                        "token",
                        require_secret(source, source.access_token.as_ref(), "an OAuth access token")?,
                    );
            }
            other => {
                return Err(CamsError::unsupported_authentication(self.data_source_type(), other));
            }
        }

        kv.push_opt("db", database(source))
            .push_opt("schema", option(source, "schema"))
            .push_opt("warehouse", option(source, "warehouse"))
            .push_opt("role", option(source, "role"));

        Ok(ConnectionDescriptor::ConnectionString(ConnectionStringDescriptor {
            data_source_type: self.data_source_type(),
            authentication_type: source.authentication_type,
            dialect: ConnectionStringDialect::KeyValue,
            value: kv.build().into(),
            endpoint: Some(endpoint(&host, port)),
        }))
    }
}
