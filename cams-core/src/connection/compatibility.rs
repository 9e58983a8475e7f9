//! Static data source / authentication compatibility matrix.

use crate::models::{AuthenticationType, DataSourceType};
use std::collections::BTreeMap;

use AuthenticationType as A;

const SQL_SERVER: &[AuthenticationType] = &[
    A::UsernamePassword,
    A::WindowsIntegrated,
    A::AzureAdPassword,
    A::AzureAdIntegrated,
    A::AzureAdServicePrincipal,
    A::AzureAdManagedIdentity,
];
const MYSQL: &[AuthenticationType] = &[A::UsernamePassword, A::X509Certificate, A::AwsIam, A::Ldap];
const MARIADB: &[AuthenticationType] = &[A::UsernamePassword, A::X509Certificate, A::Ldap];
const POSTGRESQL: &[AuthenticationType] = &[
    A::NoAuth,
    A::UsernamePassword,
    A::ScramSha256,
    A::Kerberos,
    A::Ldap,
    A::X509Certificate,
    A::AwsIam,
];
const REDSHIFT: &[AuthenticationType] = &[A::UsernamePassword, A::AwsIam];
const COCKROACH: &[AuthenticationType] = &[A::UsernamePassword, A::X509Certificate];
const ORACLE: &[AuthenticationType] = &[A::UsernamePassword, A::OracleWallet, A::Kerberos];
const MONGODB: &[AuthenticationType] = &[
    A::NoAuth,
    A::UsernamePassword,
    A::ScramSha1,
    A::ScramSha256,
    A::X509Certificate,
    A::AwsIam,
    A::Kerberos,
    A::Ldap,
];
const COSMOS: &[AuthenticationType] = &[
    A::ApiKey,
    A::AzureAdServicePrincipal,
    A::AzureAdManagedIdentity,
];
const REDIS: &[AuthenticationType] = &[A::NoAuth, A::UsernamePassword, A::X509Certificate];
const CASSANDRA: &[AuthenticationType] = &[A::NoAuth, A::UsernamePassword, A::X509Certificate];
const ELASTIC: &[AuthenticationType] = &[A::NoAuth, A::BasicAuth, A::ApiKey, A::BearerToken];
const OPENSEARCH: &[AuthenticationType] = &[A::NoAuth, A::BasicAuth, A::AwsIam];
const DYNAMODB: &[AuthenticationType] = &[A::AwsAccessKey, A::AwsIam];
const SNOWFLAKE: &[AuthenticationType] = &[A::UsernamePassword, A::KeyPair, A::OAuth2];
const REST: &[AuthenticationType] = &[A::NoAuth, A::BasicAuth, A::ApiKey, A::BearerToken, A::OAuth2];
const GRAPHQL: &[AuthenticationType] = &[A::NoAuth, A::ApiKey, A::BearerToken, A::OAuth2];
const FILE: &[AuthenticationType] = &[A::NoAuth];

/// Authentication types accepted by a data source type.
///
/// The matrix is fixed at compile time; the registry uses it to reject
/// unsupported combinations before any strategy runs.
pub fn supported_authentication_types(data_source_type: DataSourceType) -> &'static [AuthenticationType] {
    match data_source_type {
        DataSourceType::SqlServer => SQL_SERVER,
        DataSourceType::MySql => MYSQL,
        DataSourceType::MariaDb => MARIADB,
        DataSourceType::PostgreSql => POSTGRESQL,
        DataSourceType::Redshift => REDSHIFT,
        DataSourceType::CockroachDb => COCKROACH,
        DataSourceType::Oracle => ORACLE,
        DataSourceType::MongoDb => MONGODB,
        DataSourceType::CosmosDb => COSMOS,
        DataSourceType::Redis => REDIS,
        DataSourceType::Cassandra => CASSANDRA,
        DataSourceType::ElasticSearch => ELASTIC,
        DataSourceType::OpenSearch => OPENSEARCH,
        DataSourceType::DynamoDb => DYNAMODB,
        DataSourceType::Snowflake => SNOWFLAKE,
        DataSourceType::RestApi => REST,
        DataSourceType::GraphQl => GRAPHQL,
        DataSourceType::Sqlite
        | DataSourceType::Csv
        | DataSourceType::Json
        | DataSourceType::Xml
        | DataSourceType::Excel => FILE,
    }
}

/// Whether the pair is in the matrix.
pub fn is_supported(data_source_type: DataSourceType, authentication_type: AuthenticationType) -> bool {
    supported_authentication_types(data_source_type).contains(&authentication_type)
}

/// The full matrix keyed by data source type.
pub fn compatibility_matrix() -> BTreeMap<DataSourceType, Vec<AuthenticationType>> {
    DataSourceType::ALL
        .into_iter()
        .map(|dst| (dst, supported_authentication_types(dst).to_vec()))
        .collect()
}
