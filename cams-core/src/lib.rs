//! Core library for the CAMS connection and ingestion platform.
//!
//! This crate provides the types, strategies and pipelines shared by the
//! CAMS binaries:
//! - `connection`: typed connection descriptors for every supported data
//!   source and authentication pair, plus sealed storage of application
//!   connections
//! - `probe`: bounded, cancellable live connectivity tests
//! - `ingest`: bulk upload of users, roles, applications and assignments
//!   from CSV, JSON, XML and Excel files
//!
//! # Security Guarantees
//! - Secrets at rest are sealed with AES-GCM and a random nonce per value
//! - Plaintext secrets live in zeroizing containers and never reach logs
//! - Connection strings in errors and diagnostics are redacted
//!
//! # Architecture
//! The core library follows these patterns:
//! - Strategy pattern for per-data-source descriptor building
//! - Repository traits at the persistence boundary
//! - One sequential pipeline per ingestion job, many jobs concurrently

/// Data source connections: strategies, descriptors and stored records
pub mod connection;
/// Error types and result alias
pub mod error;
/// Bulk file ingestion
pub mod ingest;
/// Tracing subscriber setup
pub mod logging;
/// Data source and authentication type enums
pub mod models;
/// Live connectivity probes
pub mod probe;
/// Secret handling and credential sealing
pub mod security;

// Re-export commonly used types
pub use connection::{
    ApplicationConnection, ConnectionDescriptor, ConnectionService, ConnectionSource,
    ConnectionStrategy, ConnectionStrategyRegistry,
};
pub use error::{CamsError, Result};
pub use ingest::{BatchIngestionEngine, BulkUploadRequest, IngestionSettings, JobManager};
pub use models::{AuthenticationType, DataSourceType};
pub use probe::{ConnectionProbe, ProbeDispatcher, ProbeOutcome, ProbeSettings};
pub use security::{CredentialCodec, Secret};
