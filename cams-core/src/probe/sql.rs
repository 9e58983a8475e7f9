//! Relational probes: `SELECT 1` over sqlx or tiberius.

use super::{ConnectionProbe, ProbeOutcome, ProbeSettings, bounded, wrong_descriptor};
use crate::connection::ConnectionDescriptor;
use crate::models::DataSourceType;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Runs `SELECT 1` on a single, unpooled connection.
#[derive(Debug, Clone)]
pub struct SqlProbe {
    settings: ProbeSettings,
    cancel: CancellationToken,
}

impl SqlProbe {
    /// Creates a probe bounded by `settings` and observing `cancel`.
    pub fn new(settings: ProbeSettings, cancel: CancellationToken) -> Self {
        Self { settings, cancel }
    }
}

#[async_trait]
impl ConnectionProbe for SqlProbe {
    async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ProbeOutcome {
        let ConnectionDescriptor::ConnectionString(d) = descriptor else {
            return wrong_descriptor("SQL", descriptor);
        };
        let value = d.value.expose();
        let attempt = async {
            match d.data_source_type {
                DataSourceType::PostgreSql
                | DataSourceType::Redshift
                | DataSourceType::CockroachDb => select_one_postgres(value).await,
                DataSourceType::MySql | DataSourceType::MariaDb => select_one_mysql(value).await,
                DataSourceType::Sqlite => select_one_sqlite(value).await,
                DataSourceType::SqlServer => select_one_mssql(value).await,
                other => Err(format!("{other} is not reachable over SQL")),
            }
        };
        bounded(descriptor, &self.settings, &self.cancel, attempt).await
    }
}

#[cfg(feature = "postgresql")]
async fn select_one_postgres(url: &str) -> Result<String, String> {
    use sqlx::Connection;

    let mut conn = sqlx::PgConnection::connect(url)
        .await
        .map_err(|e| format!("Connection failed: {e}"))?;
    let result = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&mut conn)
        .await
        .map_err(|e| format!("Query failed: {e}"));
    let _ = conn.close().await;
    result.map(|_| "Connection successful".to_string())
}

#[cfg(not(feature = "postgresql"))]
async fn select_one_postgres(_url: &str) -> Result<String, String> {
    Err("PostgreSQL support not compiled in (enable the `postgresql` feature)".to_string())
}

#[cfg(feature = "mysql")]
async fn select_one_mysql(url: &str) -> Result<String, String> {
    use sqlx::Connection;

    let mut conn = sqlx::MySqlConnection::connect(url)
        .await
        .map_err(|e| format!("Connection failed: {e}"))?;
    let result = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&mut conn)
        .await
        .map_err(|e| format!("Query failed: {e}"));
    let _ = conn.close().await;
    result.map(|_| "Connection successful".to_string())
}

#[cfg(not(feature = "mysql"))]
async fn select_one_mysql(_url: &str) -> Result<String, String> {
    Err("MySQL support not compiled in (enable the `mysql` feature)".to_string())
}

#[cfg(feature = "sqlite")]
async fn select_one_sqlite(url: &str) -> Result<String, String> {
    use sqlx::Connection;

    let mut conn = sqlx::SqliteConnection::connect(url)
        .await
        .map_err(|e| format!("Connection failed: {e}"))?;
    let result = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&mut conn)
        .await
        .map_err(|e| format!("Query failed: {e}"));
    let _ = conn.close().await;
    result.map(|_| "Connection successful".to_string())
}

#[cfg(not(feature = "sqlite"))]
async fn select_one_sqlite(_url: &str) -> Result<String, String> {
    Err("SQLite support not compiled in (enable the `sqlite` feature)".to_string())
}

#[cfg(feature = "mssql")]
async fn select_one_mssql(ado: &str) -> Result<String, String> {
    use tokio_util::compat::TokioAsyncWriteCompatExt;

    let config = tiberius::Config::from_ado_string(ado)
        .map_err(|e| format!("Invalid SQL Server connection string: {e}"))?;
    let tcp = tokio::net::TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| format!("Connection failed: {e}"))?;
    tcp.set_nodelay(true)
        .map_err(|e| format!("Connection failed: {e}"))?;

    let mut client = tiberius::Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| format!("Login failed: {e}"))?;
    let result = match client.simple_query("SELECT 1").await {
        Ok(stream) => stream
            .into_row()
            .await
            .map(|_| ())
            .map_err(|e| format!("Query failed: {e}")),
        Err(e) => Err(format!("Query failed: {e}")),
    };
    let _ = client.close().await;
    result.map(|()| "Connection successful".to_string())
}

#[cfg(not(feature = "mssql"))]
async fn select_one_mssql(_ado: &str) -> Result<String, String> {
    Err("SQL Server support not compiled in (enable the `mssql` feature)".to_string())
}
