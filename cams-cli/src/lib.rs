//! Library module for the `cams` binary.
//!
//! Argument definitions and command implementations live here so they can
//! be exercised from tests. `main.rs` only wires logging and exit codes.
//!
//! # Security
//! - Secrets are read from files, the environment or a hidden prompt, never
//!   from positional arguments
//! - Connection strings are only ever printed in redacted form
//! - The encryption key is taken from `CAMS_ENCRYPTION_KEY` and never logged

/// `auth-types`, `describe`, `test`, `seal` and `encrypt`
pub mod connection;
/// The `ingest` command
pub mod ingest;
/// Plain-text rendering of results
pub mod output;

use anyhow::Context;
use cams_core::CredentialCodec;
use cams_core::ingest::{IngestionSettings, TableType};
use cams_core::probe::ProbeSettings;
use clap::{ArgGroup, Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Environment variable holding the credential encryption key.
pub const ENCRYPTION_KEY_ENV: &str = "CAMS_ENCRYPTION_KEY";

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "cams")]
#[command(about = "Connection testing and bulk ingestion for CAMS")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "
CAMS - connection management and bulk ingestion

Builds and tests connections to databases, caches, search clusters, HTTP
APIs and files, seals connection secrets for storage, and imports users,
roles, applications and user-role assignments from CSV, JSON, XML and Excel.

SECURITY FEATURES:
- Secrets sealed with AES-GCM (key from CAMS_ENCRYPTION_KEY)
- Connection strings redacted in all output
- Secrets never accepted as positional arguments

EXAMPLES:
  cams auth-types PostgreSql
  cams describe --url postgres://app@db.internal/crm
  cams test --source crm.json --timeout 5
  cams seal --source crm.json > crm.sealed.json
  cams ingest users.csv roles.xlsx --output-dir ./imported
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List authentication types supported per data source type
    AuthTypes {
        /// Data source type (all types when omitted)
        data_source_type: Option<String>,
    },
    /// Print the redacted connection descriptor for a source
    Describe(SourceArgs),
    /// Test live connectivity for a source
    Test(TestArgs),
    /// Seal a source's secrets into a storable application connection
    Seal(SealArgs),
    /// Encrypt one secret value read from a prompt or stdin
    Encrypt(EncryptArgs),
    /// Generate a new base64 encryption key
    GenerateKey,
    /// Import users, roles, applications or assignments from files
    Ingest(IngestArgs),
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all logs except errors")]
    pub quiet: bool,

    /// JSON log lines
    #[arg(long, global = true, help = "Write logs as JSON lines")]
    pub log_json: bool,

    /// Settings file
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "JSON settings file with `ingestion` and `probe` sections"
    )]
    pub settings: Option<PathBuf>,
}

/// Where a connection comes from. Exactly one input is required.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("input").required(true).args(["url", "source", "record"])))]
pub struct SourceArgs {
    /// Connection URL (postgres://, mysql://, mongodb://, redis://, https://, file://)
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// JSON file holding a plaintext connection source
    #[arg(long, value_name = "FILE")]
    pub source: Option<PathBuf>,

    /// JSON file holding a sealed application connection
    #[arg(long, value_name = "FILE")]
    pub record: Option<PathBuf>,

    #[command(flatten)]
    pub key: KeyArgs,
}

#[derive(Clone, Args)]
pub struct KeyArgs {
    /// Encryption key (`base64:<key>` or a passphrase)
    #[arg(long = "key", env = ENCRYPTION_KEY_ENV, hide_env_values = true, value_name = "KEY")]
    pub key: Option<String>,

    /// Salt for passphrase keys
    #[arg(long = "key-salt", env = "CAMS_ENCRYPTION_KEY_SALT", hide_env_values = true)]
    pub salt: Option<String>,
}

impl std::fmt::Debug for KeyArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyArgs")
            .field("key", &self.key.as_ref().map(|_| "****"))
            .field("salt", &self.salt.as_ref().map(|_| "****"))
            .finish()
    }
}

impl KeyArgs {
    /// Codec for the configured key.
    ///
    /// # Errors
    /// Fails if no key is configured or the key material is unusable.
    pub fn codec(&self) -> anyhow::Result<CredentialCodec> {
        let key = self.key.as_deref().with_context(|| {
            format!("An encryption key is required; set {ENCRYPTION_KEY_ENV} or pass --key")
        })?;
        let key = zeroize::Zeroizing::new(key.to_string());
        Ok(CredentialCodec::from_key_material(&key, self.salt.as_deref())?)
    }

    /// Codec for the configured key, or a throwaway one when none is set.
    ///
    /// Only suitable when nothing sealed with it is kept.
    pub fn codec_or_ephemeral(&self) -> anyhow::Result<CredentialCodec> {
        if self.key.is_some() {
            return self.codec();
        }
        Ok(CredentialCodec::from_base64_key(&CredentialCodec::generate_key())?)
    }
}

#[derive(Debug, Args)]
pub struct TestArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Connect timeout in seconds
    #[arg(long, value_name = "SECONDS", help = "Connect timeout (overrides settings)")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Args)]
pub struct SealArgs {
    /// JSON file holding a plaintext connection source
    #[arg(long, value_name = "FILE")]
    pub source: PathBuf,

    /// Owning application (random when omitted)
    #[arg(long, value_name = "UUID")]
    pub application_id: Option<Uuid>,

    /// Output file (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub key: KeyArgs,
}

#[derive(Debug, Args)]
pub struct EncryptArgs {
    /// Read the secret from stdin instead of prompting
    #[arg(long)]
    pub stdin: bool,

    #[command(flatten)]
    pub key: KeyArgs,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Files to import, processed in order
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Directory receiving `<table>.jsonl` output
    #[arg(short, long, default_value = "cams-output", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Skip detection and import as this table type
    #[arg(long, value_parser = parse_table_type, value_name = "TYPE")]
    pub table_type: Option<TableType>,

    /// Explicit column mapping, repeatable
    #[arg(long = "map", value_parser = parse_mapping, value_name = "COLUMN=FIELD")]
    pub mappings: Vec<(String, String)>,

    /// Fail a file on any validation error instead of skipping bad rows
    #[arg(long)]
    pub strict: bool,

    /// Stop the whole job at the first failed file or batch
    #[arg(long)]
    pub stop_on_error: bool,

    /// CSV delimiter (tab for .tsv files, comma otherwise)
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Text encoding (utf-8 or latin-1)
    #[arg(long, default_value = "utf-8")]
    pub encoding: String,

    /// Treat the first row as data
    #[arg(long)]
    pub no_header: bool,

    /// Excel sheet to read (first sheet when omitted)
    #[arg(long, value_name = "NAME")]
    pub sheet: Option<String>,

    /// Write the final job snapshot as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Free-form label stored with the job
    #[arg(long)]
    pub label: Option<String>,

    /// Validate and count without writing output
    #[arg(long)]
    pub dry_run: bool,
}

/// Settings file contents. Missing sections use defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliSettings {
    /// Ingestion pipeline settings
    pub ingestion: IngestionSettings,
    /// Connectivity probe settings
    pub probe: ProbeSettings,
}

impl CliSettings {
    /// Loads and validates settings, or defaults when `path` is `None`.
    ///
    /// # Errors
    /// Fails if the file cannot be read, parsed or validated.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings file {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid settings file {}", path.display()))?
            }
            None => Self::default(),
        };
        settings.ingestion.validate()?;
        settings.probe.validate()?;
        Ok(settings)
    }
}

/// Parses `COLUMN=FIELD`.
///
/// # Errors
/// Returns a message when either side is missing.
pub fn parse_mapping(value: &str) -> Result<(String, String), String> {
    let (column, field) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("expected COLUMN=FIELD, got '{value}'"))?;
    let (column, field) = (column.trim(), field.trim());
    if column.is_empty() || field.is_empty() {
        return Err(format!("expected COLUMN=FIELD, got '{value}'"));
    }
    Ok((column.to_string(), field.to_string()))
}

/// Parses an importable table type.
///
/// # Errors
/// Returns a message for unknown or non-importable names.
pub fn parse_table_type(value: &str) -> Result<TableType, String> {
    let table_type: TableType = value.parse().map_err(|e| format!("{e}"))?;
    if !table_type.is_known() {
        return Err(format!("'{value}' cannot be imported"));
    }
    Ok(table_type)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_mapping() {
        assert_eq!(
            parse_mapping("E-Mail Address=email").unwrap(),
            ("E-Mail Address".to_string(), "email".to_string())
        );
        assert_eq!(
            parse_mapping("a=b=c").unwrap(),
            ("a=b".to_string(), "c".to_string())
        );
        assert!(parse_mapping("email").is_err());
        assert!(parse_mapping("=email").is_err());
    }

    #[test]
    fn test_parse_table_type_rejects_mixed() {
        assert_eq!(parse_table_type("users").unwrap(), TableType::Users);
        assert!(parse_table_type("mixed").is_err());
        assert!(parse_table_type("invoices").is_err());
    }

    #[test]
    fn test_ingest_arguments() {
        let cli = Cli::try_parse_from([
            "cams",
            "-vv",
            "ingest",
            "users.csv",
            "roles.json",
            "--table-type",
            "users",
            "--map",
            "Mail=email",
            "--strict",
        ])
        .unwrap();
        assert_eq!(cli.global.verbose, 2);
        let Command::Ingest(args) = cli.command else {
            panic!("expected ingest");
        };
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.table_type, Some(TableType::Users));
        assert_eq!(args.mappings, vec![("Mail".to_string(), "email".to_string())]);
        assert!(args.strict);
        assert!(!args.stop_on_error);
    }

    #[test]
    fn test_source_input_is_exclusive() {
        assert!(Cli::try_parse_from(["cams", "describe"]).is_err());
        assert!(
            Cli::try_parse_from(["cams", "describe", "--url", "redis://h", "--source", "s.json"])
                .is_err()
        );
    }

    #[test]
    fn test_settings_file_sections_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"ingestion": {"retry_count": 1}}"#).unwrap();
        let settings = CliSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.ingestion.retry_count, 1);
        assert_eq!(settings.probe, ProbeSettings::default());

        std::fs::write(&path, r#"{"probe": {"connect_timeout_secs": 0}}"#).unwrap();
        assert!(CliSettings::load(Some(&path)).is_err());
    }
}
