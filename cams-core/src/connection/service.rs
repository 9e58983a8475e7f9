//! Application-facing connection operations: seal and store, describe, and
//! test live connectivity.

use super::{ApplicationConnection, ConnectionDescriptor, ConnectionSource, ConnectionStrategyRegistry};
use crate::Result;
use crate::error::CamsError;
use crate::probe::{ConnectionProbe, ProbeOutcome};
use crate::security::CredentialCodec;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence boundary for sealed connection records.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Inserts or replaces a record by id.
    async fn save_application_connection(&self, record: &ApplicationConnection) -> Result<()>;

    /// Loads a record by id.
    async fn find_application_connection(&self, id: Uuid) -> Result<Option<ApplicationConnection>>;
}

/// Process-local store, used by tests and the CLI.
#[derive(Debug, Default)]
pub struct InMemoryConnectionStore {
    records: RwLock<HashMap<Uuid, ApplicationConnection>>,
}

impl InMemoryConnectionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn save_application_connection(&self, record: &ApplicationConnection) -> Result<()> {
        record.check_sealed()?;
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_application_connection(&self, id: Uuid) -> Result<Option<ApplicationConnection>> {
        Ok(self.records.read().await.get(&id).cloned())
    }
}

/// Ties the registry, codec, store and probe together.
///
/// All collaborators are shared read-only, so one service can be cloned
/// into every request handler.
#[derive(Clone)]
pub struct ConnectionService {
    registry: Arc<ConnectionStrategyRegistry>,
    codec: Arc<CredentialCodec>,
    store: Arc<dyn ConnectionStore>,
    probe: Arc<dyn ConnectionProbe>,
}

impl std::fmt::Debug for ConnectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionService")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ConnectionService {
    /// Service over shared collaborators.
    pub fn new(
        registry: Arc<ConnectionStrategyRegistry>,
        codec: Arc<CredentialCodec>,
        store: Arc<dyn ConnectionStore>,
        probe: Arc<dyn ConnectionProbe>,
    ) -> Self {
        Self {
            registry,
            codec,
            store,
            probe,
        }
    }

    /// Strategy registry used for building descriptors.
    pub fn registry(&self) -> &ConnectionStrategyRegistry {
        &self.registry
    }

    /// Validates, seals and stores a new connection for an application.
    ///
    /// The source is built once before sealing so that incomplete sources
    /// are rejected instead of stored. Absent secrets are stored as `""`.
    ///
    /// # Errors
    /// - `UnsupportedDataSource` / `UnsupportedAuthentication` for the pair
    /// - `InvalidSource` for missing fields
    /// - `Crypto` or `Persistence` from sealing and storing
    pub async fn create_application_connection(
        &self,
        application_id: Uuid,
        source: &ConnectionSource,
    ) -> Result<ApplicationConnection> {
        self.registry.build_descriptor(source)?;
        let record = ApplicationConnection::seal(application_id, source, &self.codec)?;
        self.store.save_application_connection(&record).await?;
        tracing::info!(
            connection_id = %record.id,
            application_id = %application_id,
            data_source_type = %record.data_source_type,
            authentication_type = %record.authentication_type,
            "Application connection created"
        );
        Ok(record)
    }

    /// Re-seals an existing record from a new source and stores it.
    ///
    /// # Errors
    /// Same as `create_application_connection`.
    pub async fn update_application_connection(
        &self,
        record: &mut ApplicationConnection,
        source: &ConnectionSource,
    ) -> Result<()> {
        self.registry.build_descriptor(source)?;
        record.reseal(source, &self.codec)?;
        self.store.save_application_connection(record).await?;
        tracing::info!(
            connection_id = %record.id,
            application_id = %record.application_id,
            "Application connection updated"
        );
        Ok(())
    }

    /// Validates the pair, builds the descriptor and probes it.
    ///
    /// # Errors
    /// Returns build errors. Connectivity failures are reported in the
    /// outcome, never as errors.
    pub async fn test_connection(&self, source: &ConnectionSource) -> Result<ProbeOutcome> {
        let descriptor = self.registry.build_descriptor(source)?;
        Ok(self.probe.test_connection(&descriptor).await)
    }

    /// Unseals a stored record, builds its descriptor and probes it.
    ///
    /// # Errors
    /// `Crypto` if the record cannot be unsealed, plus build errors.
    pub async fn test_saved_connection(&self, record: &ApplicationConnection) -> Result<ProbeOutcome> {
        let descriptor = self.descriptor_for_record(record)?;
        Ok(self.probe.test_connection(&descriptor).await)
    }

    /// Loads a record by id and probes it.
    ///
    /// # Errors
    /// `Validation` if no record has that id.
    pub async fn test_stored_connection(&self, id: Uuid) -> Result<ProbeOutcome> {
        let record = self
            .store
            .find_application_connection(id)
            .await?
            .ok_or_else(|| CamsError::validation(format!("Connection {id} does not exist")))?;
        self.test_saved_connection(&record).await
    }

    /// Redacted descriptor, safe for logs and operator output.
    ///
    /// # Errors
    /// Returns build errors.
    pub fn describe(&self, source: &ConnectionSource) -> Result<String> {
        Ok(self.registry.build_descriptor(source)?.redacted())
    }

    fn descriptor_for_record(&self, record: &ApplicationConnection) -> Result<ConnectionDescriptor> {
        self.registry
            .validate(record.data_source_type, record.authentication_type)?;
        self.registry
            .resolve(record.data_source_type)?
            .build_descriptor_from_record(record, &self.codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthenticationType, DataSourceType};
    use crate::security::CredentialCodec;
    use std::sync::Mutex;

    /// Records every descriptor it is asked to probe.
    #[derive(Default)]
    struct RecordingProbe {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConnectionProbe for RecordingProbe {
        async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ProbeOutcome {
            self.seen.lock().unwrap().push(descriptor.redacted());
            ProbeOutcome::success("ok", std::time::Duration::ZERO)
        }
    }

    fn service() -> (ConnectionService, Arc<InMemoryConnectionStore>, Arc<RecordingProbe>) {
        let key = CredentialCodec::generate_key();
        let codec = CredentialCodec::from_base64_key(&key).unwrap();
        let store = Arc::new(InMemoryConnectionStore::new());
        let probe = Arc::new(RecordingProbe::default());
        let service = ConnectionService::new(
            Arc::new(ConnectionStrategyRegistry::with_defaults()),
            Arc::new(codec),
            store.clone(),
            probe.clone(),
        );
        (service, store, probe)
    }

    #[tokio::test]
    async fn test_no_auth_stores_empty_password() {
        let (service, store, _) = service();
        let source = ConnectionSource::new(DataSourceType::Redis, AuthenticationType::NoAuth)
            .with_host("cache.local");
        let record = service
            .create_application_connection(Uuid::new_v4(), &source)
            .await
            .unwrap();
        assert_eq!(record.password, "");
        let stored = store.find_application_connection(record.id).await.unwrap().unwrap();
        assert_eq!(stored.password, "");
    }

    #[tokio::test]
    async fn test_passwords_are_sealed_at_rest() {
        let (service, store, _) = service();
        let source = ConnectionSource::new(DataSourceType::PostgreSql, AuthenticationType::UsernamePassword)
            .with_host("db.local")
            .with_database("cams")
            .with_credentials("app", "pg-secret");
        let record = service
            .create_application_connection(Uuid::new_v4(), &source)
            .await
            .unwrap();
        assert!(CredentialCodec::is_encrypted(&record.password));
        assert!(!record.password.contains("pg-secret"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unsupported_pair_is_not_stored() {
        let (service, store, _) = service();
        let source = ConnectionSource::new(DataSourceType::Redis, AuthenticationType::Kerberos)
            .with_host("cache.local");
        let err = service
            .create_application_connection(Uuid::new_v4(), &source)
            .await
            .unwrap_err();
        assert!(matches!(err, CamsError::UnsupportedAuthentication { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_keeps_identity() {
        let (service, _, _) = service();
        let source = ConnectionSource::new(DataSourceType::MySql, AuthenticationType::UsernamePassword)
            .with_host("db.local")
            .with_database("cams")
            .with_credentials("app", "old");
        let mut record = service
            .create_application_connection(Uuid::new_v4(), &source)
            .await
            .unwrap();
        let id = record.id;
        let created = record.created_at;

        let updated = source.with_credentials("app", "new");
        service
            .update_application_connection(&mut record, &updated)
            .await
            .unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.created_at, created);
        assert!(record.updated_at >= created);
    }

    #[tokio::test]
    async fn test_saved_connection_is_unsealed_before_probing() {
        let (service, _, probe) = service();
        let source = ConnectionSource::new(DataSourceType::PostgreSql, AuthenticationType::UsernamePassword)
            .with_host("db.local")
            .with_database("cams")
            .with_credentials("app", "pg-secret");
        let record = service
            .create_application_connection(Uuid::new_v4(), &source)
            .await
            .unwrap();
        let outcome = service.test_stored_connection(record.id).await.unwrap();
        assert!(outcome.success);
        let seen = probe.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("db.local"));
        assert!(!seen[0].contains("pg-secret"));
    }

    #[tokio::test]
    async fn test_describe_is_redacted() {
        let (service, _, _) = service();
        let source = ConnectionSource::new(DataSourceType::SqlServer, AuthenticationType::UsernamePassword)
            .with_host("sql.local")
            .with_database("cams")
            .with_credentials("sa", "Str0ng!Pass");
        let described = service.describe(&source).unwrap();
        assert!(described.contains("sql.local"));
        assert!(!described.contains("Str0ng!Pass"));
    }
}
