//! Persistable application connection records.
//!
//! Every secret-bearing field of an `ApplicationConnection` holds either an
//! empty string or a sealed `ENC:` value; plaintext never reaches storage.

use super::source::{
    AwsSettings, AzureAdSettings, CertificateSettings, ConnectionSource, FileSettings,
    KerberosSettings,
};
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};
use crate::security::{CredentialCodec, Secret};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// AWS settings with the secret key and session token sealed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedAwsSettings {
    /// AWS region
    pub region: Option<String>,
    /// Access key id, stored in the clear
    pub access_key_id: Option<String>,
    /// Sealed secret access key, or empty
    pub secret_access_key: String,
    /// Sealed session token, or empty
    pub session_token: String,
    /// Role to assume
    pub role_arn: Option<String>,
}

/// Client certificate settings with the key password sealed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedCertificateSettings {
    /// Client certificate file
    pub certificate_path: Option<String>,
    /// Private key file
    pub key_path: Option<String>,
    /// CA bundle file
    pub ca_path: Option<String>,
    /// Sealed private key password, or empty
    pub key_password: String,
}

/// Azure AD service principal with the client secret sealed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedAzureAdSettings {
    /// Directory (tenant) id
    pub tenant_id: Option<String>,
    /// Application (client) id
    pub client_id: Option<String>,
    /// Sealed client secret, or empty
    pub client_secret: String,
}

/// Stored connection of an application to one data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConnection {
    /// Record identifier
    pub id: Uuid,
    /// Owning application
    pub application_id: Uuid,
    /// Kind of data source
    pub data_source_type: DataSourceType,
    /// How the connection authenticates
    pub authentication_type: AuthenticationType,
    /// Server host name
    pub host: Option<String>,
    /// Server port; the type default when absent
    pub port: Option<u16>,
    /// Database, keyspace or index
    pub database: Option<String>,
    /// Endpoint URL for URL-addressed sources
    pub url: Option<String>,
    /// Login name, stored in the clear
    pub username: Option<String>,
    /// Sealed password, or empty
    pub password: String,
    /// Sealed API key, or empty
    pub api_key: String,
    /// Sealed access token, or empty
    pub access_token: String,
    /// AWS settings
    pub aws: Option<SealedAwsSettings>,
    /// Kerberos settings
    pub kerberos: Option<KerberosSettings>,
    /// Client certificate settings
    pub certificate: Option<SealedCertificateSettings>,
    /// Azure AD settings
    pub azure: Option<SealedAzureAdSettings>,
    /// File source settings
    pub file: Option<FileSettings>,
    /// Require TLS
    pub use_ssl: bool,
    /// Accept unverified server certificates
    pub trust_server_certificate: bool,
    /// Connect timeout override
    pub connect_timeout_secs: Option<u64>,
    /// Driver-specific extras
    pub options: BTreeMap<String, String>,
    /// Creation time
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last update time
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

fn seal(codec: &CredentialCodec, secret: Option<&Secret>) -> crate::Result<String> {
    match secret {
        Some(secret) => codec.encrypt(secret.expose()),
        None => Ok(String::new()),
    }
}

fn unseal(codec: &CredentialCodec, sealed: &str) -> crate::Result<Option<Secret>> {
    if sealed.is_empty() {
        return Ok(None);
    }
    codec.decrypt(sealed).map(|plain| Some(Secret::new(plain)))
}

impl ApplicationConnection {
    /// Seals a source into a new record owned by `application_id`.
    ///
    /// # Errors
    /// Returns `Crypto` if encryption fails.
    pub fn seal(
        application_id: Uuid,
        source: &ConnectionSource,
        codec: &CredentialCodec,
    ) -> crate::Result<Self> {
        let now = chrono::Utc::now();
        let mut record = Self {
            id: Uuid::new_v4(),
            application_id,
            data_source_type: source.data_source_type,
            authentication_type: source.authentication_type,
            host: None,
            port: None,
            database: None,
            url: None,
            username: None,
            password: String::new(),
            api_key: String::new(),
            access_token: String::new(),
            aws: None,
            kerberos: None,
            certificate: None,
            azure: None,
            file: None,
            use_ssl: false,
            trust_server_certificate: false,
            connect_timeout_secs: None,
            options: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        };
        record.apply(source, codec)?;
        Ok(record)
    }

    /// Overwrites every field from `source`, re-sealing all secrets.
    ///
    /// Identity and creation time are preserved.
    pub fn reseal(&mut self, source: &ConnectionSource, codec: &CredentialCodec) -> crate::Result<()> {
        self.apply(source, codec)?;
        self.updated_at = chrono::Utc::now();
        Ok(())
    }

    fn apply(&mut self, source: &ConnectionSource, codec: &CredentialCodec) -> crate::Result<()> {
        self.data_source_type = source.data_source_type;
        self.authentication_type = source.authentication_type;
        self.host = source.host.clone();
        self.port = source.port;
        self.database = source.database.clone();
        self.url = source.url.clone();
        self.username = source.username.clone();
        self.password = seal(codec, source.password.as_ref())?;
        self.api_key = seal(codec, source.api_key.as_ref())?;
        self.access_token = seal(codec, source.access_token.as_ref())?;
        self.aws = source
            .aws
            .as_ref()
            .map(|aws| -> crate::Result<SealedAwsSettings> {
                Ok(SealedAwsSettings {
                    region: aws.region.clone(),
                    access_key_id: aws.access_key_id.clone(),
                    secret_access_key: seal(codec, aws.secret_access_key.as_ref())?,
                    session_token: seal(codec, aws.session_token.as_ref())?,
                    role_arn: aws.role_arn.clone(),
                })
            })
            .transpose()?;
        self.kerberos = source.kerberos.clone();
        self.certificate = source
            .certificate
            .as_ref()
            .map(|cert| -> crate::Result<SealedCertificateSettings> {
                Ok(SealedCertificateSettings {
                    certificate_path: cert.certificate_path.clone(),
                    key_path: cert.key_path.clone(),
                    ca_path: cert.ca_path.clone(),
                    key_password: seal(codec, cert.key_password.as_ref())?,
                })
            })
            .transpose()?;
        self.azure = source
            .azure
            .as_ref()
            .map(|azure| -> crate::Result<SealedAzureAdSettings> {
                Ok(SealedAzureAdSettings {
                    tenant_id: azure.tenant_id.clone(),
                    client_id: azure.client_id.clone(),
                    client_secret: seal(codec, azure.client_secret.as_ref())?,
                })
            })
            .transpose()?;
        self.file = source.file.clone();
        self.use_ssl = source.use_ssl;
        self.trust_server_certificate = source.trust_server_certificate;
        self.connect_timeout_secs = source.connect_timeout_secs;
        self.options = source.options.clone();
        Ok(())
    }

    /// Decrypts the record back into a request-scoped source.
    ///
    /// # Errors
    /// Returns `Crypto` if any sealed field fails to decrypt.
    pub fn unseal(&self, codec: &CredentialCodec) -> crate::Result<ConnectionSource> {
        let mut source = ConnectionSource::new(self.data_source_type, self.authentication_type);
        source.host = self.host.clone();
        source.port = self.port;
        source.database = self.database.clone();
        source.url = self.url.clone();
        source.username = self.username.clone();
        source.password = unseal(codec, &self.password)?;
        source.api_key = unseal(codec, &self.api_key)?;
        source.access_token = unseal(codec, &self.access_token)?;
        source.aws = match &self.aws {
            Some(aws) => Some(AwsSettings {
                region: aws.region.clone(),
                access_key_id: aws.access_key_id.clone(),
                secret_access_key: unseal(codec, &aws.secret_access_key)?,
                session_token: unseal(codec, &aws.session_token)?,
                role_arn: aws.role_arn.clone(),
            }),
            None => None,
        };
        source.kerberos = self.kerberos.clone();
        source.certificate = match &self.certificate {
            Some(cert) => Some(CertificateSettings {
                certificate_path: cert.certificate_path.clone(),
                key_path: cert.key_path.clone(),
                ca_path: cert.ca_path.clone(),
                key_password: unseal(codec, &cert.key_password)?,
            }),
            None => None,
        };
        source.azure = match &self.azure {
            Some(azure) => Some(AzureAdSettings {
                tenant_id: azure.tenant_id.clone(),
                client_id: azure.client_id.clone(),
                client_secret: unseal(codec, &azure.client_secret)?,
            }),
            None => None,
        };
        source.file = self.file.clone();
        source.use_ssl = self.use_ssl;
        source.trust_server_certificate = self.trust_server_certificate;
        source.connect_timeout_secs = self.connect_timeout_secs;
        source.options = self.options.clone();
        Ok(source)
    }

    /// Names and values of every secret-bearing field.
    pub fn sealed_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![
            ("password", self.password.as_str()),
            ("api_key", self.api_key.as_str()),
            ("access_token", self.access_token.as_str()),
        ];
        if let Some(aws) = &self.aws {
            fields.push(("aws.secret_access_key", aws.secret_access_key.as_str()));
            fields.push(("aws.session_token", aws.session_token.as_str()));
        }
        if let Some(cert) = &self.certificate {
            fields.push(("certificate.key_password", cert.key_password.as_str()));
        }
        if let Some(azure) = &self.azure {
            fields.push(("azure.client_secret", azure.client_secret.as_str()));
        }
        fields
    }

    /// Verifies that no secret-bearing field holds plaintext.
    ///
    /// # Errors
    /// Returns `Validation` naming the first offending field.
    pub fn check_sealed(&self) -> crate::Result<()> {
        for (name, value) in self.sealed_fields() {
            if !value.is_empty() && !CredentialCodec::is_encrypted(value) {
                return Err(CamsError::validation(format!(
                    "Field '{}' holds an unsealed secret",
                    name
                )));
            }
        }
        Ok(())
    }
}
