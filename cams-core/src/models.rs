//! Core enumerations shared by the connection and ingestion subsystems.
//!
//! Data source and authentication types are closed enums so that every
//! strategy can branch exhaustively on them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of backing store or connector an application can be wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataSourceType {
    SqlServer,
    MySql,
    MariaDb,
    PostgreSql,
    Redshift,
    CockroachDb,
    Oracle,
    Sqlite,
    MongoDb,
    CosmosDb,
    Redis,
    Cassandra,
    ElasticSearch,
    OpenSearch,
    DynamoDb,
    Snowflake,
    RestApi,
    GraphQl,
    Csv,
    Json,
    Xml,
    Excel,
}

impl DataSourceType {
    /// Every data source type, in declaration order.
    pub const ALL: [Self; 22] = [
        Self::SqlServer,
        Self::MySql,
        Self::MariaDb,
        Self::PostgreSql,
        Self::Redshift,
        Self::CockroachDb,
        Self::Oracle,
        Self::Sqlite,
        Self::MongoDb,
        Self::CosmosDb,
        Self::Redis,
        Self::Cassandra,
        Self::ElasticSearch,
        Self::OpenSearch,
        Self::DynamoDb,
        Self::Snowflake,
        Self::RestApi,
        Self::GraphQl,
        Self::Csv,
        Self::Json,
        Self::Xml,
        Self::Excel,
    ];

    /// Default network port, if the backend listens on one.
    pub fn default_port(self) -> Option<u16> {
        match self {
            Self::SqlServer => Some(1433),
            Self::MySql | Self::MariaDb => Some(3306),
            Self::PostgreSql => Some(5432),
            Self::Redshift => Some(5439),
            Self::CockroachDb => Some(26257),
            Self::Oracle => Some(1521),
            Self::MongoDb => Some(27017),
            Self::CosmosDb | Self::Snowflake | Self::DynamoDb => Some(443),
            Self::Redis => Some(6379),
            Self::Cassandra => Some(9042),
            Self::ElasticSearch | Self::OpenSearch => Some(9200),
            Self::RestApi | Self::GraphQl => None,
            Self::Sqlite | Self::Csv | Self::Json | Self::Xml | Self::Excel => None,
        }
    }

    /// Whether the source is a local file rather than a network service.
    pub fn is_file_based(self) -> bool {
        matches!(
            self,
            Self::Sqlite | Self::Csv | Self::Json | Self::Xml | Self::Excel
        )
    }
}

impl std::fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SqlServer => "SQL Server",
            Self::MySql => "MySQL",
            Self::MariaDb => "MariaDB",
            Self::PostgreSql => "PostgreSQL",
            Self::Redshift => "Redshift",
            Self::CockroachDb => "CockroachDB",
            Self::Oracle => "Oracle",
            Self::Sqlite => "SQLite",
            Self::MongoDb => "MongoDB",
            Self::CosmosDb => "Cosmos DB",
            Self::Redis => "Redis",
            Self::Cassandra => "Cassandra",
            Self::ElasticSearch => "Elasticsearch",
            Self::OpenSearch => "OpenSearch",
            Self::DynamoDb => "DynamoDB",
            Self::Snowflake => "Snowflake",
            Self::RestApi => "REST API",
            Self::GraphQl => "GraphQL",
            Self::Csv => "CSV",
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::Excel => "Excel",
        };
        f.write_str(name)
    }
}

impl FromStr for DataSourceType {
    type Err = crate::error::CamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        let parsed = match normalized.as_str() {
            "sqlserver" | "mssql" | "azuresql" => Self::SqlServer,
            "mysql" => Self::MySql,
            "mariadb" => Self::MariaDb,
            "postgresql" | "postgres" | "pg" => Self::PostgreSql,
            "redshift" => Self::Redshift,
            "cockroachdb" | "cockroach" => Self::CockroachDb,
            "oracle" => Self::Oracle,
            "sqlite" => Self::Sqlite,
            "mongodb" | "mongo" => Self::MongoDb,
            "cosmosdb" | "cosmos" => Self::CosmosDb,
            "redis" => Self::Redis,
            "cassandra" => Self::Cassandra,
            "elasticsearch" | "elastic" | "es" => Self::ElasticSearch,
            "opensearch" => Self::OpenSearch,
            "dynamodb" | "dynamo" => Self::DynamoDb,
            "snowflake" => Self::Snowflake,
            "restapi" | "rest" | "http" => Self::RestApi,
            "graphql" => Self::GraphQl,
            "csv" => Self::Csv,
            "json" => Self::Json,
            "xml" => Self::Xml,
            "excel" | "xlsx" | "xls" => Self::Excel,
            _ => {
                return Err(crate::error::CamsError::validation(format!(
                    "Unknown data source type '{s}'"
                )));
            }
        };
        Ok(parsed)
    }
}

/// Credential scheme used to connect to a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuthenticationType {
    NoAuth,
    UsernamePassword,
    WindowsIntegrated,
    AzureAdPassword,
    AzureAdIntegrated,
    AzureAdServicePrincipal,
    AzureAdManagedIdentity,
    Kerberos,
    Ldap,
    X509Certificate,
    ScramSha1,
    ScramSha256,
    AwsIam,
    AwsAccessKey,
    ApiKey,
    BearerToken,
    BasicAuth,
    OAuth2,
    OracleWallet,
    KeyPair,
}

impl AuthenticationType {
    /// Every authentication type, in declaration order.
    pub const ALL: [Self; 20] = [
        Self::NoAuth,
        Self::UsernamePassword,
        Self::WindowsIntegrated,
        Self::AzureAdPassword,
        Self::AzureAdIntegrated,
        Self::AzureAdServicePrincipal,
        Self::AzureAdManagedIdentity,
        Self::Kerberos,
        Self::Ldap,
        Self::X509Certificate,
        Self::ScramSha1,
        Self::ScramSha256,
        Self::AwsIam,
        Self::AwsAccessKey,
        Self::ApiKey,
        Self::BearerToken,
        Self::BasicAuth,
        Self::OAuth2,
        Self::OracleWallet,
        Self::KeyPair,
    ];
}

impl std::fmt::Display for AuthenticationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoAuth => "NoAuth",
            Self::UsernamePassword => "UsernamePassword",
            Self::WindowsIntegrated => "WindowsIntegrated",
            Self::AzureAdPassword => "AzureAdPassword",
            Self::AzureAdIntegrated => "AzureAdIntegrated",
            Self::AzureAdServicePrincipal => "AzureAdServicePrincipal",
            Self::AzureAdManagedIdentity => "AzureAdManagedIdentity",
            Self::Kerberos => "Kerberos",
            Self::Ldap => "Ldap",
            Self::X509Certificate => "X509Certificate",
            Self::ScramSha1 => "ScramSha1",
            Self::ScramSha256 => "ScramSha256",
            Self::AwsIam => "AwsIam",
            Self::AwsAccessKey => "AwsAccessKey",
            Self::ApiKey => "ApiKey",
            Self::BearerToken => "BearerToken",
            Self::BasicAuth => "BasicAuth",
            Self::OAuth2 => "OAuth2",
            Self::OracleWallet => "OracleWallet",
            Self::KeyPair => "KeyPair",
        };
        f.write_str(name)
    }
}

impl FromStr for AuthenticationType {
    type Err = crate::error::CamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|auth| normalize(&auth.to_string()) == normalized)
            .or(match normalized.as_str() {
                "none" | "anonymous" => Some(Self::NoAuth),
                "password" | "sqlserver" | "sql" => Some(Self::UsernamePassword),
                "windows" | "integrated" | "sspi" => Some(Self::WindowsIntegrated),
                "x509" | "certificate" => Some(Self::X509Certificate),
                "iam" => Some(Self::AwsIam),
                "token" | "bearer" => Some(Self::BearerToken),
                "wallet" => Some(Self::OracleWallet),
                _ => None,
            })
            .ok_or_else(|| {
                crate::error::CamsError::validation(format!("Unknown authentication type '{s}'"))
            })
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_type_aliases() {
        assert_eq!(
            "mssql".parse::<DataSourceType>().unwrap(),
            DataSourceType::SqlServer
        );
        assert_eq!(
            "PostgreSQL".parse::<DataSourceType>().unwrap(),
            DataSourceType::PostgreSql
        );
        assert_eq!(
            "Elastic-Search".parse::<DataSourceType>().unwrap(),
            DataSourceType::ElasticSearch
        );
        assert!("mainframe".parse::<DataSourceType>().is_err());
    }

    #[test]
    fn test_authentication_type_round_trips_display() {
        for auth in AuthenticationType::ALL {
            assert_eq!(auth.to_string().parse::<AuthenticationType>().unwrap(), auth);
        }
        assert_eq!(
            "x509".parse::<AuthenticationType>().unwrap(),
            AuthenticationType::X509Certificate
        );
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(DataSourceType::SqlServer.default_port(), Some(1433));
        assert_eq!(DataSourceType::Redshift.default_port(), Some(5439));
        assert_eq!(DataSourceType::Csv.default_port(), None);
        assert!(DataSourceType::Excel.is_file_based());
        assert!(!DataSourceType::Redis.is_file_based());
    }
}
