//! MySQL and MariaDB strategy producing `mysql://` URLs.

use super::helpers::{
    UrlBuilder, connect_timeout, database, endpoint, ensure_supported, password,
    require_certificate, require_host, require_secret, require_username, resolve_port,
};
use crate::Result;
use crate::connection::{
    ConnectionDescriptor, ConnectionSource, ConnectionStrategy, ConnectionStringDescriptor,
    ConnectionStringDialect,
};
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};

/// Strategy for the MySQL wire-protocol family.
#[derive(Debug, Clone, Copy)]
pub struct MySqlStrategy {
    flavor: DataSourceType,
}

impl MySqlStrategy {
    /// MySQL servers.
    pub fn mysql() -> Self {
        Self {
            flavor: DataSourceType::MySql,
        }
    }

    /// MariaDB servers.
    pub fn mariadb() -> Self {
        Self {
            flavor: DataSourceType::MariaDb,
        }
    }
}

impl ConnectionStrategy for MySqlStrategy {
    fn data_source_type(&self) -> DataSourceType {
        self.flavor
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        let host = require_host(source)?;
        let port = resolve_port(source)?;
        let username = require_username(source)?;
        let default_ssl_mode = if source.use_ssl { "required" } else { "preferred" };

        let builder = UrlBuilder::new("mysql", host, Some(port))?.path(database(source));
        let builder = match source.authentication_type {
            AuthenticationType::UsernamePassword => builder
                .credentials(Some(username), Some(password(source)))?
                .param("ssl-mode", default_ssl_mode),
            AuthenticationType::X509Certificate => {
                let certificate = require_certificate(source)?;
                builder
                    .credentials(Some(username), None)?
                    .param(
                        "ssl-mode",
                        if certificate.ca_path.is_some() { "verify_ca" } else { "required" },
                    )
                    .param_opt("ssl-ca", certificate.ca_path.as_deref())
                    .param_opt("ssl-cert", certificate.certificate_path.as_deref())
                    .param_opt("ssl-key", certificate.key_path.as_deref())
            }
            AuthenticationType::AwsIam => {
                // RDS IAM: a short-lived auth token stands in for the password.
                let token = require_secret(source, source.access_token.as_ref(), "an IAM auth token")?;
                builder
                    .credentials(Some(username), Some(token))?
                    .param("ssl-mode", "required")
                    .param("enable-cleartext-plugin", "true")
            }
            AuthenticationType::Ldap => builder
                .credentials(Some(username), Some(password(source)))?
                .param("ssl-mode", "required")
                .param("enable-cleartext-plugin", "true"),
            other => {
                return Err(CamsError::unsupported_authentication(self.flavor, other));
            }
        };

        let value = builder
            .param("connect-timeout", connect_timeout(source).to_string())
            .passthrough(source, &[])
            .build();

        Ok(ConnectionDescriptor::ConnectionString(ConnectionStringDescriptor {
            data_source_type: self.flavor,
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
    fn test_username_password_url() {
        let source = ConnectionSource::new(DataSourceType::MySql, AuthenticationType::UsernamePassword)
            .with_host("mysql.local")
            .with_database("cams")
            .with_credentials("app", "pw");
        let url = connection_string(&MySqlStrategy::mysql().build_descriptor(&source).unwrap());
        assert_eq!(
            url,
            "mysql://app:pw@mysql.local:3306/cams?ssl-mode=preferred&connect-timeout=15"
        );
    }

    #[test]
    fn test_x509_adds_tls_files() {
        let source = ConnectionSource::new(DataSourceType::MariaDb, AuthenticationType::X509Certificate)
            .with_host("maria.local")
            .with_credentials("svc", "")
            .with_certificate(CertificateSettings {
                certificate_path: Some("/certs/client.pem".to_string()),
                key_path: Some("/certs/client.key".to_string()),
                ca_path: Some("/certs/ca.pem".to_string()),
                key_password: None,
            });
        let url = connection_string(&MySqlStrategy::mariadb().build_descriptor(&source).unwrap());
        assert!(url.starts_with("mysql://svc@maria.local:3306"));
        assert!(url.contains("ssl-mode=verify_ca"));
        assert!(url.contains("ssl-cert=%2Fcerts%2Fclient.pem"));
    }

    #[test]
    fn test_aws_iam_requires_token() {
        let source = ConnectionSource::new(DataSourceType::MySql, AuthenticationType::AwsIam)
            .with_host("rds.amazonaws.com")
            .with_credentials("iam_user", "");
        assert!(matches!(
            MySqlStrategy::mysql().build_descriptor(&source),
            Err(CamsError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_flavor_mismatch_is_rejected() {
        let source = ConnectionSource::new(DataSourceType::MySql, AuthenticationType::UsernamePassword)
            .with_host("mysql.local")
            .with_credentials("app", "pw");
        assert!(MySqlStrategy::mariadb().build_descriptor(&source).is_err());
    }
}
