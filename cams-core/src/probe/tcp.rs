//! Reachability probe for backends without a native client in the stack.

use super::{ConnectionProbe, ProbeOutcome, ProbeSettings, bounded, wrong_descriptor};
use crate::connection::{ConnectionDescriptor, Endpoint};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// Opens and immediately closes a TCP connection to the descriptor's
/// endpoint. Credentials are not verified.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    settings: ProbeSettings,
    cancel: CancellationToken,
}

impl TcpProbe {
    /// Creates a probe bounded by `settings` and observing `cancel`.
    pub fn new(settings: ProbeSettings, cancel: CancellationToken) -> Self {
        Self { settings, cancel }
    }
}

#[async_trait]
impl ConnectionProbe for TcpProbe {
    async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ProbeOutcome {
        let Some(endpoint) = descriptor.endpoint() else {
            return wrong_descriptor("TCP", descriptor);
        };
        bounded(descriptor, &self.settings, &self.cancel, reach(endpoint)).await
    }
}

async fn reach(endpoint: Endpoint) -> Result<String, String> {
    let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|e| format!("Cannot reach {endpoint}: {e}"))?;
    drop(stream);
    Ok(format!(
        "Reachability check only: {endpoint} accepted a TCP connection. \
         No liveness command was run and credentials were not verified"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionSource, ConnectionStrategyRegistry};
    use crate::models::{AuthenticationType, DataSourceType};
    use tokio::net::TcpListener;

    fn cassandra(port: u16) -> ConnectionDescriptor {
        let source = ConnectionSource::new(DataSourceType::Cassandra, AuthenticationType::NoAuth)
            .with_host("127.0.0.1")
            .with_port(port);
        ConnectionStrategyRegistry::with_defaults()
            .build_descriptor(&source)
            .unwrap()
    }

    #[tokio::test]
    async fn test_reachable_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let outcome = TcpProbe::new(ProbeSettings::default(), CancellationToken::new())
            .test_connection(&cassandra(port))
            .await;
        assert!(outcome.success, "{}", outcome.message);
        assert!(outcome.message.starts_with("Reachability check only"));
        assert!(outcome.message.contains("credentials were not verified"));
    }

    #[tokio::test]
    async fn test_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let outcome = TcpProbe::new(ProbeSettings::default(), CancellationToken::new())
            .test_connection(&cassandra(port))
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Cannot reach"));
    }
}
