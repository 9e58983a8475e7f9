//! Per-backend connection strategies.

mod cassandra;
mod cosmos;
mod dynamodb;
mod file;
pub(crate) mod helpers;
mod http_api;
mod mongodb;
mod mysql;
mod oracle;
mod postgres;
mod redis;
mod search;
mod snowflake;
mod sqlite;
mod sqlserver;

pub use cassandra::CassandraStrategy;
pub use cosmos::CosmosStrategy;
pub use dynamodb::DynamoDbStrategy;
pub use file::FileStrategy;
pub use http_api::HttpApiStrategy;
pub use mongodb::MongoStrategy;
pub use mysql::MySqlStrategy;
pub use oracle::OracleStrategy;
pub use postgres::PostgresStrategy;
pub use redis::RedisStrategy;
pub use search::SearchClusterStrategy;
pub use snowflake::SnowflakeStrategy;
pub use sqlite::SqliteStrategy;
pub use sqlserver::SqlServerStrategy;

use super::ConnectionStrategy;
use crate::models::DataSourceType;
use std::sync::Arc;

/// The built-in strategy for a data source type.
pub fn default_strategy(data_source_type: DataSourceType) -> Arc<dyn ConnectionStrategy> {
    match data_source_type {
        DataSourceType::SqlServer => Arc::new(SqlServerStrategy),
        DataSourceType::MySql => Arc::new(MySqlStrategy::mysql()),
        DataSourceType::MariaDb => Arc::new(MySqlStrategy::mariadb()),
        DataSourceType::PostgreSql => Arc::new(PostgresStrategy::postgresql()),
        DataSourceType::Redshift => Arc::new(PostgresStrategy::redshift()),
        DataSourceType::CockroachDb => Arc::new(PostgresStrategy::cockroachdb()),
        DataSourceType::Oracle => Arc::new(OracleStrategy),
        DataSourceType::Sqlite => Arc::new(SqliteStrategy),
        DataSourceType::MongoDb => Arc::new(MongoStrategy),
        DataSourceType::CosmosDb => Arc::new(CosmosStrategy),
        DataSourceType::Redis => Arc::new(RedisStrategy),
        DataSourceType::Cassandra => Arc::new(CassandraStrategy),
        DataSourceType::ElasticSearch => Arc::new(SearchClusterStrategy::elasticsearch()),
        DataSourceType::OpenSearch => Arc::new(SearchClusterStrategy::opensearch()),
        DataSourceType::DynamoDb => Arc::new(DynamoDbStrategy),
        DataSourceType::Snowflake => Arc::new(SnowflakeStrategy),
        DataSourceType::RestApi => Arc::new(HttpApiStrategy::rest()),
        DataSourceType::GraphQl => Arc::new(HttpApiStrategy::graphql()),
        DataSourceType::Csv => Arc::new(FileStrategy::csv()),
        DataSourceType::Json => Arc::new(FileStrategy::json()),
        DataSourceType::Xml => Arc::new(FileStrategy::xml()),
        DataSourceType::Excel => Arc::new(FileStrategy::excel()),
    }
}
