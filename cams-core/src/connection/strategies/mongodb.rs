//! MongoDB strategy producing `mongodb://` URIs.

use super::helpers::{
    UrlBuilder, aws, connect_timeout, database, endpoint, ensure_supported, option, password,
    require_certificate, require_host, require_username, resolve_port, username,
};
use crate::Result;
use crate::connection::{
    ConnectionDescriptor, ConnectionSource, ConnectionStrategy, ConnectionStringDescriptor,
    ConnectionStringDialect,
};
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};
use crate::security::non_empty;

const EXTERNAL_AUTH_SOURCE: &str = "$external";

/// MongoDB `mongodb://` URIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoStrategy;

impl ConnectionStrategy for MongoStrategy {
    fn data_source_type(&self) -> DataSourceType {
        DataSourceType::MongoDb
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        let host = require_host(source)?;
        let port = resolve_port(source)?;
        let srv = option(source, "srv") == Some("true");

        let builder = if srv {
            UrlBuilder::new("mongodb+srv", host, None)?
        } else {
            UrlBuilder::new("mongodb", host, Some(port))?
        };
        // The driver requires a path separator before any options.
        let builder = builder.path(Some(database(source).unwrap_or_default()));
        let password_auth_source = option(source, "authSource")
            .or(database(source))
            .unwrap_or("admin");

        let builder = match source.authentication_type {
            AuthenticationType::NoAuth => builder,
            AuthenticationType::UsernamePassword => builder
                .credentials(Some(require_username(source)?), Some(password(source)))?
                .param("authSource", password_auth_source),
            AuthenticationType::ScramSha1 | AuthenticationType::ScramSha256 => {
                let mechanism = if source.authentication_type == AuthenticationType::ScramSha1 {
                    "SCRAM-SHA-1"
                } else {
                    "SCRAM-SHA-256"
                };
                builder
                    .credentials(Some(require_username(source)?), Some(password(source)))?
                    .param("authSource", password_auth_source)
                    .param("authMechanism", mechanism)
            }
            AuthenticationType::X509Certificate => {
                let certificate = require_certificate(source)?;
                builder
                    .credentials(username(source), None)?
                    .param("authSource", EXTERNAL_AUTH_SOURCE)
                    .param("authMechanism", "MONGODB-X509")
                    .param("tls", "true")
                    .param_opt("tlsCertificateKeyFile", certificate.certificate_path.as_deref())
                    .param_opt("tlsCAFile", certificate.ca_path.as_deref())
            }
            AuthenticationType::AwsIam => {
                let aws = aws(source);
                let access_key = aws.and_then(|a| a.access_key_id.as_deref());
                let secret_key = aws.and_then(|a| non_empty(a.secret_access_key.as_ref()));
                let session_token = aws.and_then(|a| non_empty(a.session_token.as_ref()));
                builder
                    .credentials(access_key, secret_key)?
                    .param("authSource", EXTERNAL_AUTH_SOURCE)
                    .param("authMechanism", "MONGODB-AWS")
                    .param_opt(
                        "authMechanismProperties",
                        session_token.map(|t| format!("AWS_SESSION_TOKEN:{t}")).as_deref(),
                    )
            }
            AuthenticationType::Kerberos => {
                let service = source
                    .kerberos
                    .as_ref()
                    .and_then(|k| k.service_principal.as_deref())
                    .unwrap_or("mongodb");
                builder
                    .credentials(Some(require_username(source)?), None)?
                    .param("authSource", EXTERNAL_AUTH_SOURCE)
                    .param("authMechanism", "GSSAPI")
                    .param("authMechanismProperties", format!("SERVICE_NAME:{service}"))
            }
            AuthenticationType::Ldap => builder
                .credentials(Some(require_username(source)?), Some(password(source)))?
                .param("authSource", EXTERNAL_AUTH_SOURCE)
                .param("authMechanism", "PLAIN"),
            other => {
                return Err(CamsError::unsupported_authentication(self.data_source_type(), other));
            }
        };

        let builder = if source.use_ssl && source.authentication_type != AuthenticationType::X509Certificate {
            builder.param("tls", "true")
        } else {
            builder
        };
        let builder = if source.trust_server_certificate {
            builder.param("tlsAllowInvalidCertificates", "true")
        } else {
            builder
        };
        let value = builder
            .param("connectTimeoutMS", (connect_timeout(source) * 1000).to_string())
            .passthrough(source, &["srv", "authSource"])
            .build();

        Ok(ConnectionDescriptor::ConnectionString(ConnectionStringDescriptor {
            data_source_type: DataSourceType::MongoDb,
            authentication_type: source.authentication_type,
            dialect: ConnectionStringDialect::Url,
            value: value.into(),
            endpoint: Some(endpoint(host, port)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::helpers::connection_string;
    use super::*;
    use crate::connection::CertificateSettings;

    #[test]
    fn test_scram_sha_256() {
        let source = ConnectionSource::new(DataSourceType::MongoDb, AuthenticationType::ScramSha256)
            .with_host("mongo.local")
            .with_database("cams")
            .with_credentials("app", "pw");
        let uri = connection_string(&MongoStrategy.build_descriptor(&source).unwrap());
        assert_eq!(
            uri,
            "mongodb://app:pw@mongo.local:27017/cams?authSource=cams&authMechanism=SCRAM-SHA-256&connectTimeoutMS=15000"
        );
    }

    #[test]
    fn test_no_auth_keeps_path_separator() {
        let source = ConnectionSource::new(DataSourceType::MongoDb, AuthenticationType::NoAuth)
            .with_host("mongo.local");
        let uri = connection_string(&MongoStrategy.build_descriptor(&source).unwrap());
        assert_eq!(uri, "mongodb://mongo.local:27017/?connectTimeoutMS=15000");
    }

    #[test]
    fn test_x509_uses_external_source() {
        let source = ConnectionSource::new(DataSourceType::MongoDb, AuthenticationType::X509Certificate)
            .with_host("mongo.local")
            .with_certificate(CertificateSettings {
                certificate_path: Some("/certs/client.pem".to_string()),
                key_path: Some("/certs/client.pem".to_string()),
                ca_path: None,
                key_password: None,
            });
        let uri = connection_string(&MongoStrategy.build_descriptor(&source).unwrap());
        assert!(uri.contains("authMechanism=MONGODB-X509"));
        assert!(uri.contains("authSource=%24external"));
        assert!(uri.contains("tls=true"));
    }

    #[test]
    fn test_srv_omits_port() {
        let source = ConnectionSource::new(DataSourceType::MongoDb, AuthenticationType::UsernamePassword)
            .with_host("cluster0.example.net")
            .with_credentials("app", "pw")
            .with_option("srv", "true");
        let uri = connection_string(&MongoStrategy.build_descriptor(&source).unwrap());
        assert!(uri.starts_with("mongodb+srv://app:pw@cluster0.example.net/?"));
    }
}
