//! Redis probe: `PING` over a `redis` client connection.
//!
//! `AUTH` and `SELECT` are issued by the client during the handshake, so a
//! rejected password or database index fails before `PING` is sent. TLS
//! descriptors connect through `rediss://` and must complete the handshake.

use super::{ConnectionProbe, ProbeOutcome, ProbeSettings, bounded, wrong_descriptor};
use crate::connection::{ConnectionDescriptor, RedisDescriptor};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Tests Redis descriptors with a client round trip.
#[derive(Debug, Clone)]
pub struct RedisProbe {
    settings: ProbeSettings,
    cancel: CancellationToken,
}

impl RedisProbe {
    /// Creates a probe bounded by `settings` and observing `cancel`.
    pub fn new(settings: ProbeSettings, cancel: CancellationToken) -> Self {
        Self { settings, cancel }
    }
}

#[async_trait]
impl ConnectionProbe for RedisProbe {
    async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ProbeOutcome {
        let ConnectionDescriptor::Redis(d) = descriptor else {
            return wrong_descriptor("Redis", descriptor);
        };
        bounded(descriptor, &self.settings, &self.cancel, ping(d)).await
    }
}

/// Client URL for the descriptor. Credentials are percent-encoded.
fn client_url(d: &RedisDescriptor) -> Result<Url, String> {
    let scheme = if d.tls { "rediss" } else { "redis" };
    let host = if d.host.contains(':') {
        format!("[{}]", d.host)
    } else {
        d.host.clone()
    };
    let mut url = Url::parse(&format!("{scheme}://{host}:{}/{}", d.port, d.database_index))
        .map_err(|e| format!("Invalid Redis endpoint {host}:{}: {e}", d.port))?;
    if let Some(username) = &d.username {
        url.set_username(username)
            .map_err(|()| "Invalid Redis username".to_string())?;
    }
    if let Some(password) = &d.password {
        url.set_password(Some(password.expose()))
            .map_err(|()| "Invalid Redis password".to_string())?;
    }
    Ok(url)
}

#[cfg(feature = "redis")]
async fn open_client(d: &RedisDescriptor, url: Url) -> Result<::redis::Client, String> {
    let Some(files) = d.client_tls.as_ref().filter(|_| d.tls) else {
        return ::redis::Client::open(url.as_str())
            .map_err(|e| format!("Failed to create Redis client: {e}"));
    };

    let client_cert = read_tls_file(files.certificate_path.as_deref(), "certificate").await?;
    let client_key = read_tls_file(files.key_path.as_deref(), "key").await?;
    let root_cert = read_tls_file(files.ca_path.as_deref(), "CA bundle").await?;

    let client_tls = match (client_cert, client_key) {
        (Some(client_cert), Some(client_key)) => Some(::redis::ClientTlsConfig {
            client_cert,
            client_key,
        }),
        _ => None,
    };
    ::redis::Client::build_with_tls(
        url.as_str(),
        ::redis::TlsCertificates {
            client_tls,
            root_cert,
        },
    )
    .map_err(|e| format!("Failed to create Redis TLS client: {e}"))
}

#[cfg(feature = "redis")]
async fn read_tls_file(path: Option<&str>, what: &str) -> Result<Option<Vec<u8>>, String> {
    let Some(path) = path else {
        return Ok(None);
    };
    tokio::fs::read(path)
        .await
        .map(Some)
        .map_err(|e| format!("Cannot read TLS {what} '{path}': {e}"))
}

#[cfg(feature = "redis")]
async fn ping(d: &RedisDescriptor) -> Result<String, String> {
    let client = open_client(d, client_url(d)?).await?;
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| match e.kind() {
            ::redis::ErrorKind::AuthenticationFailed => format!("AUTH rejected: {e}"),
            _ => format!("Connection to {}:{} failed: {e}", d.host, d.port),
        })?;

    let reply: String = ::redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| format!("PING failed: {e}"))?;
    if reply == "PONG" {
        Ok("Connection successful".to_string())
    } else {
        Err(format!("Unexpected PING reply: {reply}"))
    }
}

#[cfg(not(feature = "redis"))]
async fn ping(d: &RedisDescriptor) -> Result<String, String> {
    client_url(d)?;
    Err("Redis support not compiled in (enable the `redis` feature)".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::TlsFiles;
    use crate::security::Secret;
    use tokio::net::TcpListener;

    fn redis_descriptor(port: u16, password: Option<&str>, tls: bool) -> RedisDescriptor {
        RedisDescriptor {
            host: "127.0.0.1".to_string(),
            port,
            database_index: 0,
            username: None,
            password: password.map(Secret::new),
            tls,
            client_tls: None,
            connect_timeout_secs: 2,
        }
    }

    fn probe() -> RedisProbe {
        RedisProbe::new(
            ProbeSettings::default().with_connect_timeout_secs(2),
            CancellationToken::new(),
        )
    }

    /// Accepts connections, answers each with `+PONG` in plain text and
    /// keeps the socket open.
    #[cfg(feature = "redis")]
    async fn plain_text_listener() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let mut held = Vec::new();
            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"+PONG\r\n").await;
                held.push(socket);
            }
        });
        port
    }

    #[test]
    fn test_client_url_encodes_credentials_and_database() {
        let d = RedisDescriptor {
            host: "cache.local".to_string(),
            port: 6380,
            database_index: 3,
            username: Some("app".to_string()),
            password: Some(Secret::new("p@ss/word")),
            tls: true,
            client_tls: Some(TlsFiles::default()),
            connect_timeout_secs: 5,
        };
        let url = client_url(&d).unwrap();
        assert_eq!(url.scheme(), "rediss");
        assert_eq!(url.path(), "/3");
        assert_eq!(url.username(), "app");
        assert_eq!(url.password(), Some("p%40ss%2Fword"));
    }

    #[test]
    fn test_client_url_brackets_ipv6_hosts() {
        let mut d = redis_descriptor(6379, None, false);
        d.host = "::1".to_string();
        let url = client_url(&d).unwrap();
        assert_eq!(url.host_str(), Some("[::1]"));
        assert_eq!(url.port(), Some(6379));
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    async fn test_tls_against_plain_text_server_fails() {
        let port = plain_text_listener().await;
        let outcome = probe()
            .test_connection(&ConnectionDescriptor::Redis(redis_descriptor(
                port,
                Some("hunter22"),
                true,
            )))
            .await;
        assert!(!outcome.success, "{}", outcome.message);
        assert!(!outcome.message.contains("hunter22"));
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    async fn test_server_closing_connection_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });
        let outcome = probe()
            .test_connection(&ConnectionDescriptor::Redis(redis_descriptor(port, None, false)))
            .await;
        assert!(!outcome.success, "{}", outcome.message);
    }

    #[tokio::test]
    async fn test_refused_connection_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let outcome = probe()
            .test_connection(&ConnectionDescriptor::Redis(redis_descriptor(port, None, false)))
            .await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_rejects_other_descriptors() {
        let descriptor = ConnectionDescriptor::File(crate::connection::FileDescriptor {
            data_source_type: crate::models::DataSourceType::Csv,
            path: std::path::PathBuf::from("users.csv"),
            delimiter: ',',
            encoding: "utf-8".to_string(),
            has_header: true,
            sheet_name: None,
        });
        let outcome = probe().test_connection(&descriptor).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Redis probe cannot test"));
    }
}
