//! DynamoDB strategy producing an AWS descriptor.

use super::helpers::{database, ensure_supported, require_region};
use super::http_api::aws_credentials;
use crate::Result;
use crate::connection::{AwsDescriptor, ConnectionDescriptor, ConnectionSource, ConnectionStrategy};
use crate::error::CamsError;
use crate::models::{AuthenticationType, DataSourceType};

/// DynamoDB regional endpoint and AWS credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamoDbStrategy;

impl ConnectionStrategy for DynamoDbStrategy {
    fn data_source_type(&self) -> DataSourceType {
        DataSourceType::DynamoDb
    }

    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor> {
        ensure_supported(self, source)?;
        let region = require_region(source)?;
        let credentials = match source.authentication_type {
            AuthenticationType::AwsAccessKey => aws_credentials(source, true)?,
            AuthenticationType::AwsIam => aws_credentials(source, false)?,
            other => {
                return Err(CamsError::unsupported_authentication(self.data_source_type(), other));
            }
        };

        // An explicit URL targets DynamoDB Local or a VPC endpoint.
        let endpoint_url = match source.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(raw) => {
                url::Url::parse(raw)
                    .map_err(|e| CamsError::invalid_source(format!("Invalid endpoint URL: {}", e)))?;
                Some(raw.trim_end_matches('/').to_string())
            }
            None => source
                .host
                .as_deref()
                .filter(|h| !h.trim().is_empty())
                .map(|host| match source.port {
                    Some(port) => format!("http://{host}:{port}"),
                    None => format!("https://{host}"),
                }),
        };

        Ok(ConnectionDescriptor::Aws(AwsDescriptor {
            service: "dynamodb".to_string(),
            region: region.to_string(),
            endpoint_url,
            table: database(source).map(str::to_string),
            credentials,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{AwsCredentials, AwsSettings};
    use crate::security::Secret;

    fn aws_settings() -> AwsSettings {
        AwsSettings {
            region: Some("us-east-1".to_string()),
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some(Secret::new("aws-secret")),
            session_token: None,
            role_arn: None,
        }
    }

    #[test]
    fn test_access_key_descriptor() {
        let source = ConnectionSource::new(DataSourceType::DynamoDb, AuthenticationType::AwsAccessKey)
            .with_database("users")
            .with_aws(aws_settings());
        let ConnectionDescriptor::Aws(descriptor) = DynamoDbStrategy.build_descriptor(&source).unwrap() else {
            panic!("expected aws descriptor");
        };
        assert_eq!(descriptor.table.as_deref(), Some("users"));
        assert_eq!(descriptor.resolved_endpoint(), "https://dynamodb.us-east-1.amazonaws.com");
        assert!(matches!(descriptor.credentials, AwsCredentials::AccessKey { .. }));
    }

    #[test]
    fn test_local_endpoint_from_host() {
        let source = ConnectionSource::new(DataSourceType::DynamoDb, AuthenticationType::AwsAccessKey)
            .with_host("localhost")
            .with_port(8000)
            .with_aws(aws_settings());
        let descriptor = DynamoDbStrategy.build_descriptor(&source).unwrap();
        assert_eq!(descriptor.endpoint().unwrap().port, 8000);
    }

    #[test]
    fn test_region_is_required() {
        let source = ConnectionSource::new(DataSourceType::DynamoDb, AuthenticationType::AwsIam);
        assert!(matches!(
            DynamoDbStrategy.build_descriptor(&source),
            Err(CamsError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_access_key_auth_requires_key_id() {
        let source = ConnectionSource::new(DataSourceType::DynamoDb, AuthenticationType::AwsAccessKey)
            .with_aws(AwsSettings {
                region: Some("us-east-1".to_string()),
                ..AwsSettings::default()
            });
        assert!(DynamoDbStrategy.build_descriptor(&source).is_err());
    }
}
