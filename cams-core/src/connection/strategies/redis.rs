//! Redis strategy producing a structured descriptor.

use super::helpers::{
    connect_timeout, database, ensure_supported, require_certificate, require_host,
    require_secret, resolve_port, username,
};
use crate::Result;
use crate::connection::{
    ConnectionDescriptor, ConnectionSource, ConnectionStrategy, RedisDescriptor, TlsFiles,
};
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};
use crate::security::Secret;

/// Redis host, database index and ACL credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisStrategy;

impl ConnectionStrategy for RedisStrategy {
    fn data_source_type(&self) -> DataSourceType {
        DataSourceType::Redis
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        let host = require_host(source)?;
        let port = resolve_port(source)?;
        let database_index = match database(source) {
            Some(index) => index.parse::<u32>().map_err(|_| {
                CamsError::invalid_source("Redis database must be a numeric index")
            })?,
            None => 0,
        };

        let (username, password, client_tls) = match source.authentication_type {
            AuthenticationType::NoAuth => (None, None, None),
            AuthenticationType::UsernamePassword => {
                // Username is optional: password-only AUTH targets the default user.
                let password = require_secret(source, source.password.as_ref(), "a password")?;
                (username(source).map(str::to_string), Some(Secret::new(password)), None)
            }
            AuthenticationType::X509Certificate => {
                let certificate = require_certificate(source)?;
                let files = TlsFiles {
                    certificate_path: certificate.certificate_path.clone(),
                    key_path: certificate.key_path.clone(),
                    ca_path: certificate.ca_path.clone(),
                };
                (None, None, Some(files))
            }
            other => {
                return Err(CamsError::unsupported_authentication(self.data_source_type(), other));
            }
        };

        Ok(ConnectionDescriptor::Redis(RedisDescriptor {
            host: host.to_string(),
            port,
            database_index,
            username,
            password,
            tls: source.use_ssl || client_tls.is_some(),
            client_tls,
            connect_timeout_secs: connect_timeout(source),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_only_auth() {
        let source = ConnectionSource::new(DataSourceType::Redis, AuthenticationType::UsernamePassword)
            .with_host("cache.local")
            .with_database("3");
        let source = ConnectionSource {
            password: Some(Secret::new("pw")),
            ..source
        };
        let descriptor = RedisStrategy.build_descriptor(&source).unwrap();
        assert_eq!(descriptor.redacted(), "redis://:****@cache.local:6379/3");
    }

    #[test]
    fn test_non_numeric_database_is_invalid() {
        let source = ConnectionSource::new(DataSourceType::Redis, AuthenticationType::NoAuth)
            .with_host("cache.local")
            .with_database("sessions");
        assert!(matches!(
            RedisStrategy.build_descriptor(&source),
            Err(CamsError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_build_is_idempotent() {
        let source = ConnectionSource::new(DataSourceType::Redis, AuthenticationType::NoAuth)
            .with_host("cache.local")
            .with_ssl(true);
        let first = RedisStrategy.build_descriptor(&source).unwrap();
        let second = RedisStrategy.build_descriptor(&source).unwrap();
        assert_eq!(first, second);
    }
}
