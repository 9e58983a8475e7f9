//! Cassandra strategy producing a structured descriptor.

use super::helpers::{
    connect_timeout, database, ensure_supported, option, password, require_certificate,
    require_host, require_username, resolve_port,
};
use crate::Result;
use crate::connection::{
    CassandraDescriptor, ConnectionDescriptor, ConnectionSource, ConnectionStrategy, TlsFiles,
};
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};
use crate::security::Secret;

/// Cassandra contact points and credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct CassandraStrategy;

impl ConnectionStrategy for CassandraStrategy {
    fn data_source_type(&self) -> DataSourceType {
        DataSourceType::Cassandra
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        let contact_points: Vec<String> = require_host(source)?
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        let port = resolve_port(source)?;

        let server_tls = source.use_ssl.then(|| TlsFiles {
            ca_path: source.certificate.as_ref().and_then(|c| c.ca_path.clone()),
            ..TlsFiles::default()
        });

        let (username, password, tls) = match source.authentication_type {
            AuthenticationType::NoAuth => (None, None, server_tls),
            AuthenticationType::UsernamePassword => (
                Some(require_username(source)?.to_string()),
                Some(Secret::new(password(source))),
                server_tls,
            ),
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

        Ok(ConnectionDescriptor::Cassandra(CassandraDescriptor {
            contact_points,
            port,
            keyspace: database(source).map(str::to_string),
            local_datacenter: option(source, "local_datacenter")
                .or(option(source, "datacenter"))
                .map(str::to_string),
            username,
            password,
            tls,
            connect_timeout_secs: connect_timeout(source),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_points_are_split() {
        let source = ConnectionSource::new(DataSourceType::Cassandra, AuthenticationType::UsernamePassword)
            .with_host("cass1.local, cass2.local")
            .with_database("cams")
            .with_credentials("cassandra", "pw")
            .with_option("local_datacenter", "dc1");
        let ConnectionDescriptor::Cassandra(descriptor) = CassandraStrategy.build_descriptor(&source).unwrap()
        else {
            panic!("expected cassandra descriptor");
        };
        assert_eq!(descriptor.contact_points, vec!["cass1.local", "cass2.local"]);
        assert_eq!(descriptor.port, 9042);
        assert_eq!(descriptor.keyspace.as_deref(), Some("cams"));
        assert_eq!(descriptor.local_datacenter.as_deref(), Some("dc1"));
    }

    #[test]
    fn test_redacted_hides_password() {
        let source = ConnectionSource::new(DataSourceType::Cassandra, AuthenticationType::UsernamePassword)
            .with_host("cass1.local")
            .with_credentials("cassandra", "very-secret");
        let redacted = CassandraStrategy.build_descriptor(&source).unwrap().redacted();
        assert!(redacted.contains("user=cassandra password=****"));
        assert!(!redacted.contains("very-secret"));
    }
}
