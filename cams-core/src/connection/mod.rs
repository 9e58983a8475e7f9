//! Multi-database connection strategies.
//!
//! A strategy turns a `ConnectionSource` (or a sealed
//! `ApplicationConnection`) into a typed `ConnectionDescriptor` for one data
//! source type. Strategies are pure: they never touch the network, and
//! building twice from the same input yields equal descriptors.
//!
//! # Security
//! - Unsupported (type, authentication) pairs fail before any string is built
//! - Descriptors keep secrets in `Secret` containers; use `redacted()` to display
//! - Sealed records are only decrypted inside `build_descriptor_from_record`

/// Supported (data source, authentication) pairs
pub mod compatibility;
mod descriptor;
mod record;
mod registry;
mod service;
mod source;
/// One strategy per data source family
pub mod strategies;

pub use descriptor::{
    AwsCredentials, AwsDescriptor, CassandraDescriptor, ConnectionDescriptor,
    ConnectionStringDescriptor, ConnectionStringDialect, Endpoint, FileDescriptor, HttpAuth,
    HttpDescriptor, RedisDescriptor, SearchClusterDescriptor, TlsFiles,
};
pub use record::{
    ApplicationConnection, SealedAwsSettings, SealedAzureAdSettings, SealedCertificateSettings,
};
pub use registry::ConnectionStrategyRegistry;
pub use service::{ConnectionService, ConnectionStore, InMemoryConnectionStore};
pub use source::{
    AwsSettings, AzureAdSettings, CertificateSettings, ConnectionSource, FileSettings,
    KerberosSettings,
};

use crate::Result;
use crate::models::{AuthenticationType, DataSourceType};
use crate::security::CredentialCodec;

/// Builds connection descriptors for a single data source type.
///
/// Implementations must be object-safe and shareable across tasks so the
/// registry can hand out `Arc<dyn ConnectionStrategy>`.
pub trait ConnectionStrategy: Send + Sync {
    /// The data source type this strategy handles.
    fn data_source_type(&self) -> DataSourceType;

    /// Authentication types this strategy accepts.
    fn supported_authentication_types(&self) -> &'static [AuthenticationType] {
        compatibility::supported_authentication_types(self.data_source_type())
    }

    /// Builds a descriptor from a plaintext source.
    ///
    /// # Errors
    /// - `UnsupportedAuthentication` for pairs outside the matrix
    /// - `InvalidSource` for missing or malformed fields
    fn build_descriptor(&self, source: &ConnectionSource) -> Result<ConnectionDescriptor>;

    /// Unseals a stored record and builds its descriptor.
    ///
    /// # Errors
    /// Returns `Crypto` if a sealed field cannot be decrypted, otherwise the
    /// same errors as `build_descriptor`.
    fn build_descriptor_from_record(
        &self,
        record: &ApplicationConnection,
        codec: &CredentialCodec,
    ) -> Result<ConnectionDescriptor> {
        let source = record.unseal(codec)?;
        self.build_descriptor(&source)
    }
}
