//! Builds a descriptor for every (data source, authentication) pair and
//! checks that supported pairs succeed, unsupported pairs are rejected,
//! and redacted output never carries a secret.

#![allow(clippy::unwrap_used)]

use cams_core::connection::{
    AwsSettings, AzureAdSettings, CertificateSettings, ConnectionDescriptor, ConnectionSource,
    ConnectionStrategyRegistry, FileSettings, KerberosSettings, compatibility,
};
use cams_core::models::{AuthenticationType, DataSourceType};
use cams_core::CamsError;

const PASSWORD: &str = "pw-7f3a9c";
const API_KEY: &str = "key-51be02";
const ACCESS_TOKEN: &str = "tok-c0ffee";
const CLIENT_SECRET: &str = "cs-88aa11";
const AWS_SECRET: &str = "aws-d00dfe";
const KEY_PASSWORD: &str = "kp-4242ab";

const SECRETS: [&str; 6] = [
    PASSWORD,
    API_KEY,
    ACCESS_TOKEN,
    CLIENT_SECRET,
    AWS_SECRET,
    KEY_PASSWORD,
];

fn extension(data_source_type: DataSourceType) -> &'static str {
    match data_source_type {
        DataSourceType::Csv => "csv",
        DataSourceType::Json => "json",
        DataSourceType::Xml => "xml",
        DataSourceType::Excel => "xlsx",
        _ => "db",
    }
}

/// A source with every field any strategy might ask for.
fn complete_source(
    data_source_type: DataSourceType,
    authentication_type: AuthenticationType,
) -> ConnectionSource {
    let mut source = ConnectionSource::new(data_source_type, authentication_type)
        .with_host("db.example.com")
        .with_credentials("svc_reader", PASSWORD)
        .with_api_key(API_KEY)
        .with_access_token(ACCESS_TOKEN)
        .with_aws(AwsSettings {
            region: Some("eu-west-1".to_string()),
            access_key_id: Some("AKIAEXAMPLE123456".to_string()),
            secret_access_key: Some(AWS_SECRET.into()),
            session_token: None,
            role_arn: Some("arn:aws:iam::123456789012:role/reader".to_string()),
        })
        .with_kerberos(KerberosSettings {
            realm: Some("EXAMPLE.COM".to_string()),
            service_principal: Some("postgres/db.example.com".to_string()),
            kdc: Some("kdc.example.com".to_string()),
        })
        .with_certificate(CertificateSettings {
            certificate_path: Some("/etc/cams/client.pem".to_string()),
            key_path: Some("/etc/cams/client.key".to_string()),
            ca_path: Some("/etc/cams/ca.pem".to_string()),
            key_password: Some(KEY_PASSWORD.into()),
        })
        .with_azure(AzureAdSettings {
            tenant_id: Some("tenant-1".to_string()),
            client_id: Some("client-1".to_string()),
            client_secret: Some(CLIENT_SECRET.into()),
        })
        .with_option("warehouse", "COMPUTE_WH")
        .with_option("token_url", "https://login.example.com/oauth/token")
        .with_option("wallet_location", "/etc/cams/wallet");

    source = match data_source_type {
        DataSourceType::Redis => source.with_database("0"),
        _ => source.with_database("crm"),
    };

    if data_source_type.is_file_based() || data_source_type == DataSourceType::Sqlite {
        let path = format!("/data/input.{}", extension(data_source_type));
        source = source
            .with_url(format!("file://{path}"))
            .with_file(FileSettings {
                path: Some(path),
                ..FileSettings::default()
            });
    } else if matches!(
        data_source_type,
        DataSourceType::RestApi | DataSourceType::GraphQl
    ) {
        source = source.with_url("https://api.example.com");
    }
    source
}

#[test]
fn test_every_supported_pair_builds() {
    let registry = ConnectionStrategyRegistry::with_defaults();
    for data_source_type in DataSourceType::ALL {
        for &authentication_type in compatibility::supported_authentication_types(data_source_type) {
            let source = complete_source(data_source_type, authentication_type);
            let descriptor = registry.build_descriptor(&source).unwrap_or_else(|e| {
                panic!("{data_source_type} with {authentication_type} failed: {e}")
            });
            assert_eq!(descriptor.data_source_type(), data_source_type);

            let networked = !data_source_type.is_file_based() && data_source_type != DataSourceType::Sqlite;
            assert_eq!(
                descriptor.endpoint().is_some(),
                networked,
                "{data_source_type} with {authentication_type}"
            );

            if let ConnectionDescriptor::ConnectionString(d) = &descriptor
                && let Some(endpoint) = &d.endpoint
            {
                let redacted = descriptor.redacted();
                for fragment in [endpoint.host.clone(), endpoint.port.to_string(), "crm".to_string()] {
                    assert!(
                        redacted.contains(&fragment),
                        "{data_source_type} with {authentication_type} lacks '{fragment}': {redacted}"
                    );
                }
            }
        }
    }
}

#[test]
fn test_unsupported_pairs_are_rejected() {
    let registry = ConnectionStrategyRegistry::with_defaults();
    let mut rejected = 0;
    for data_source_type in DataSourceType::ALL {
        for authentication_type in AuthenticationType::ALL {
            if compatibility::is_supported(data_source_type, authentication_type) {
                continue;
            }
            let source = complete_source(data_source_type, authentication_type);
            let error = registry.build_descriptor(&source).unwrap_err();
            assert!(
                matches!(error, CamsError::UnsupportedAuthentication { .. }),
                "{data_source_type} with {authentication_type}: {error}"
            );
            rejected += 1;
        }
    }
    assert!(rejected > 0);
}

#[test]
fn test_building_is_deterministic() {
    let registry = ConnectionStrategyRegistry::with_defaults();
    for data_source_type in DataSourceType::ALL {
        for &authentication_type in compatibility::supported_authentication_types(data_source_type) {
            let source = complete_source(data_source_type, authentication_type);
            let first = registry.build_descriptor(&source).unwrap();
            let second = registry.build_descriptor(&source).unwrap();
            assert_eq!(first, second, "{data_source_type} with {authentication_type}");
            assert_eq!(first.redacted(), second.redacted());
        }
    }
}

#[test]
fn test_redacted_output_hides_secrets() {
    let registry = ConnectionStrategyRegistry::with_defaults();
    for data_source_type in DataSourceType::ALL {
        for &authentication_type in compatibility::supported_authentication_types(data_source_type) {
            let source = complete_source(data_source_type, authentication_type);
            let descriptor = registry.build_descriptor(&source).unwrap();
            let redacted = descriptor.redacted();
            let debug = format!("{descriptor:?}");
            for secret in SECRETS {
                assert!(
                    !redacted.contains(secret),
                    "{data_source_type} with {authentication_type} leaked a secret: {redacted}"
                );
                assert!(
                    !debug.contains(secret),
                    "{data_source_type} with {authentication_type} leaked a secret in Debug"
                );
            }
        }
    }
}

#[test]
fn test_matrix_lists_every_type() {
    let matrix = compatibility::compatibility_matrix();
    assert_eq!(matrix.len(), DataSourceType::ALL.len());
    assert!(matrix.values().all(|auth| !auth.is_empty()));
}
