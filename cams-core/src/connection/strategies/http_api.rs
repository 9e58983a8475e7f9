//! REST and GraphQL strategy, plus the HTTP auth mapping shared with
//! search clusters.

use super::helpers::{
    aws, ensure_supported, option, require_host, require_region, require_secret,
    require_username, username,
};
use crate::Result;
use crate::connection::{
    AwsCredentials, ConnectionDescriptor, ConnectionSource, ConnectionStrategy, HttpAuth,
    HttpDescriptor,
};
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};
use crate::security::{Secret, non_empty};

const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Base URL from the URL field, else `http(s)://host[:port]`.
pub(super) fn base_url(source: &ConnectionSource) -> Result<String> {
    let raw = match source.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => url.to_string(),
        None => {
            let host = require_host(source)?;
            let scheme = if source.use_ssl { "https" } else { "http" };
            match source.port.or_else(|| source.data_source_type.default_port()) {
                Some(port) => format!("{scheme}://{host}:{port}"),
                None => format!("{scheme}://{host}"),
            }
        }
    };
    let parsed = url::Url::parse(&raw)
        .map_err(|e| CamsError::invalid_source(format!("Invalid base URL: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CamsError::invalid_source(format!(
            "Base URL must use http or https, got '{}'",
            parsed.scheme()
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// AWS credentials: static keys when present, otherwise the ambient identity.
pub(super) fn aws_credentials(source: &ConnectionSource, require_keys: bool) -> Result<AwsCredentials> {
    let settings = aws(source);
    let key_id = settings
        .and_then(|a| a.access_key_id.as_deref())
        .filter(|k| !k.trim().is_empty());
    match key_id {
        Some(access_key_id) => {
            let secret = require_secret(
                source,
                settings.and_then(|a| a.secret_access_key.as_ref()),
                "a secret access key",
            )?;
            Ok(AwsCredentials::AccessKey {
                access_key_id: access_key_id.to_string(),
                secret_access_key: Secret::new(secret),
                session_token: settings
                    .and_then(|a| non_empty(a.session_token.as_ref()))
                    .map(Secret::new),
            })
        }
        None if require_keys => Err(CamsError::invalid_source(format!(
            "{} with {} requires an access key id",
            source.data_source_type, source.authentication_type
        ))),
        None => Ok(AwsCredentials::Iam {
            role_arn: settings.and_then(|a| a.role_arn.clone()),
        }),
    }
}

/// Maps an authentication type onto HTTP request credentials.
pub(super) fn http_auth(source: &ConnectionSource, aws_service: &str) -> Result<HttpAuth> {
    let auth = match source.authentication_type {
        AuthenticationType::NoAuth => HttpAuth::None,
        AuthenticationType::BasicAuth => HttpAuth::Basic {
            username: require_username(source)?.to_string(),
            password: source.password.clone().unwrap_or_default(),
        },
        AuthenticationType::ApiKey => {
            let key = require_secret(source, source.api_key.as_ref(), "an API key")?;
            if matches!(source.data_source_type, DataSourceType::ElasticSearch) {
                HttpAuth::ApiKey {
                    header: "Authorization".to_string(),
                    value: Secret::new(format!("ApiKey {key}")),
                }
            } else {
                HttpAuth::ApiKey {
                    header: option(source, "api_key_header")
                        .unwrap_or(DEFAULT_API_KEY_HEADER)
                        .to_string(),
                    value: Secret::new(key),
                }
            }
        }
        AuthenticationType::BearerToken => HttpAuth::Bearer {
            token: Secret::new(require_secret(source, source.access_token.as_ref(), "an access token")?),
        },
        AuthenticationType::OAuth2 => match non_empty(source.access_token.as_ref()) {
            // A pre-issued token short-circuits the client-credentials exchange.
            Some(token) => HttpAuth::Bearer {
                token: Secret::new(token),
            },
            None => HttpAuth::OAuth2ClientCredentials {
                token_url: option(source, "token_url")
                    .ok_or_else(|| {
                        CamsError::invalid_source("OAuth2 client credentials require a token_url option")
                    })?
                    .to_string(),
                client_id: username(source)
                    .ok_or_else(|| CamsError::invalid_source("OAuth2 client credentials require a client id"))?
                    .to_string(),
                client_secret: Secret::new(require_secret(
                    source,
                    source.password.as_ref(),
                    "a client secret",
                )?),
                scope: option(source, "scope").map(str::to_string),
            },
        },
        AuthenticationType::AwsIam => HttpAuth::AwsSigV4 {
            region: require_region(source)?.to_string(),
            service: aws_service.to_string(),
            credentials: aws_credentials(source, false)?,
        },
        other => {
            return Err(CamsError::unsupported_authentication(source.data_source_type, other));
        }
    };
    Ok(auth)
}

/// Strategy for HTTP APIs.
#[derive(Debug, Clone, Copy)]
pub struct HttpApiStrategy {
    flavor: DataSourceType,
}

impl HttpApiStrategy {
    /// REST APIs.
    pub fn rest() -> Self {
        Self {
            flavor: DataSourceType::RestApi,
        }
    }

    /// GraphQL APIs.
    pub fn graphql() -> Self {
        Self {
            flavor: DataSourceType::GraphQl,
        }
    }
}

impl ConnectionStrategy for HttpApiStrategy {
    fn data_source_type(&self) -> DataSourceType {
        self.flavor
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        Ok(ConnectionDescriptor::Http(HttpDescriptor {
            data_source_type: self.flavor,
            base_url: base_url(source)?,
            auth: http_auth(source, "execute-api")?,
            health_path: option(source, "health_path").map(str::to_string),
            accept_invalid_certs: source.trust_server_certificate,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_header_defaults() {
        let source = ConnectionSource::new(DataSourceType::RestApi, AuthenticationType::ApiKey)
            .with_url("https://api.example.com/v1/")
            .with_api_key("k-123");
        let ConnectionDescriptor::Http(descriptor) = HttpApiStrategy::rest().build_descriptor(&source).unwrap()
        else {
            panic!("expected http descriptor");
        };
        assert_eq!(descriptor.base_url, "https://api.example.com/v1");
        assert_eq!(
            descriptor.auth,
            HttpAuth::ApiKey {
                header: "X-API-Key".to_string(),
                value: Secret::new("k-123"),
            }
        );
    }

    #[test]
    fn test_oauth2_client_credentials() {
        let source = ConnectionSource::new(DataSourceType::GraphQl, AuthenticationType::OAuth2)
            .with_url("https://graph.example.com/graphql")
            .with_credentials("client-id", "client-secret")
            .with_option("token_url", "https://login.example.com/token");
        let ConnectionDescriptor::Http(descriptor) = HttpApiStrategy::graphql().build_descriptor(&source).unwrap()
        else {
            panic!("expected http descriptor");
        };
        assert!(matches!(descriptor.auth, HttpAuth::OAuth2ClientCredentials { .. }));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let source = ConnectionSource::new(DataSourceType::RestApi, AuthenticationType::NoAuth)
            .with_url("ftp://files.example.com");
        assert!(matches!(
            HttpApiStrategy::rest().build_descriptor(&source),
            Err(CamsError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_bearer_requires_token() {
        let source = ConnectionSource::new(DataSourceType::RestApi, AuthenticationType::BearerToken)
            .with_url("https://api.example.com");
        assert!(HttpApiStrategy::rest().build_descriptor(&source).is_err());
    }
}
