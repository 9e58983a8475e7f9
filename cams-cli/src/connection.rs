//! Connection commands: capability listing, descriptors, probes and sealing.

use crate::{CliSettings, EncryptArgs, KeyArgs, SealArgs, SourceArgs, TestArgs};
use anyhow::Context;
use cams_core::connection::{ConnectionStore, InMemoryConnectionStore, compatibility};
use cams_core::probe::ProbeDispatcher;
use cams_core::{
    ApplicationConnection, ConnectionService, ConnectionSource, ConnectionStrategyRegistry,
    CredentialCodec, DataSourceType, ProbeOutcome,
};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A connection input resolved from `SourceArgs`.
#[derive(Debug)]
pub enum ConnectionInput {
    Source(ConnectionSource),
    Record(ApplicationConnection),
}

/// Builds the service used by every connection command.
pub fn build_service(codec: CredentialCodec, settings: &CliSettings) -> ConnectionService {
    let store: Arc<dyn ConnectionStore> = Arc::new(InMemoryConnectionStore::new());
    ConnectionService::new(
        Arc::new(ConnectionStrategyRegistry::with_defaults()),
        Arc::new(codec),
        store,
        Arc::new(ProbeDispatcher::new(settings.probe.clone())),
    )
}

/// Lists supported authentication types, for one data source type or all.
///
/// # Errors
/// Fails for an unknown data source type name.
pub fn auth_types(data_source_type: Option<&str>) -> anyhow::Result<String> {
    let types = match data_source_type {
        Some(name) => vec![name.parse::<DataSourceType>()?],
        None => DataSourceType::ALL.to_vec(),
    };
    let lines: Vec<String> = types
        .into_iter()
        .map(|t| {
            let auth: Vec<String> = compatibility::supported_authentication_types(t)
                .iter()
                .map(ToString::to_string)
                .collect();
            format!("{t}: {}", auth.join(", "))
        })
        .collect();
    Ok(lines.join("\n"))
}

/// Loads the connection named by `args`.
///
/// # Errors
/// Fails if the file cannot be read or parsed, or the URL is invalid.
pub fn load_input(args: &SourceArgs) -> anyhow::Result<ConnectionInput> {
    if let Some(url) = &args.url {
        return Ok(ConnectionInput::Source(ConnectionSource::from_url(url)?));
    }
    if let Some(path) = &args.source {
        return Ok(ConnectionInput::Source(read_json(path)?));
    }
    if let Some(path) = &args.record {
        return Ok(ConnectionInput::Record(read_json(path)?));
    }
    anyhow::bail!("One of --url, --source or --record is required")
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Records need the real key; plaintext sources work with a throwaway one.
fn codec_for(input: &ConnectionInput, key: &KeyArgs) -> anyhow::Result<CredentialCodec> {
    match input {
        ConnectionInput::Record(_) => key.codec(),
        ConnectionInput::Source(_) => key.codec_or_ephemeral(),
    }
}

/// Redacted descriptor for a source or sealed record.
///
/// # Errors
/// Fails on unsupported pairs, incomplete sources or an unusable key.
pub fn describe(args: &SourceArgs, settings: &CliSettings) -> anyhow::Result<String> {
    let input = load_input(args)?;
    let codec = codec_for(&input, &args.key)?;
    let source = match input {
        ConnectionInput::Source(source) => source,
        ConnectionInput::Record(record) => record.unseal(&codec)?,
    };
    Ok(build_service(codec, settings).describe(&source)?)
}

/// Runs a live connectivity test.
///
/// # Errors
/// Fails when no descriptor can be built. Connectivity problems are
/// reported in the outcome.
pub async fn test(args: &TestArgs, settings: &CliSettings) -> anyhow::Result<ProbeOutcome> {
    let mut settings = settings.clone();
    if let Some(timeout) = args.timeout {
        settings.probe = settings.probe.with_connect_timeout_secs(timeout);
        settings.probe.validate()?;
    }

    let input = load_input(&args.source)?;
    let service = build_service(codec_for(&input, &args.source.key)?, &settings);
    let outcome = match &input {
        ConnectionInput::Source(source) => {
            info!(descriptor = %service.describe(source)?, "Testing connection");
            service.test_connection(source).await?
        }
        ConnectionInput::Record(record) => {
            info!(connection_id = %record.id, "Testing saved connection");
            service.test_saved_connection(record).await?
        }
    };
    Ok(outcome)
}

/// Seals a plaintext source into an application connection.
///
/// # Errors
/// Fails without a key, on unsupported pairs or on incomplete sources.
pub async fn seal(args: &SealArgs, settings: &CliSettings) -> anyhow::Result<ApplicationConnection> {
    let source: ConnectionSource = read_json(&args.source)?;
    let service = build_service(args.key.codec()?, settings);
    let application_id = args.application_id.unwrap_or_else(Uuid::new_v4);
    Ok(service
        .create_application_connection(application_id, &source)
        .await?)
}

/// Encrypts one secret from stdin or a hidden prompt.
///
/// # Errors
/// Fails without a key or when the secret cannot be read.
pub fn encrypt(args: &EncryptArgs) -> anyhow::Result<String> {
    let codec = args.key.codec()?;
    let secret = if args.stdin {
        let mut line = zeroize::Zeroizing::new(String::new());
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read secret from stdin")?;
        zeroize::Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string())
    } else {
        zeroize::Zeroizing::new(
            rpassword::prompt_password("Secret: ").context("Failed to read secret")?,
        )
    };
    Ok(codec.encrypt(&secret)?)
}
