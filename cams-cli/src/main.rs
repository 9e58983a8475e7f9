//! CAMS command-line tool.
//!
//! Builds, describes and tests connections, seals connection secrets, and
//! runs bulk ingestion jobs that write `<table>.jsonl` files.
//!
//! # Security Guarantees
//! - Connection strings are printed redacted only
//! - Secrets come from files, the environment or a hidden prompt
//! - The encryption key is never logged

use cams_cli::{Cli, CliSettings, Command, connection, ingest, output};
use cams_core::CredentialCodec;
use cams_core::logging::init_logging;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_json)?;

    let settings = CliSettings::load(cli.global.settings.as_deref())?;

    match &cli.command {
        Command::AuthTypes { data_source_type } => {
            println!("{}", connection::auth_types(data_source_type.as_deref())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Describe(args) => {
            println!("{}", connection::describe(args, &settings)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Test(args) => {
            let outcome = connection::test(args, &settings).await?;
            println!("{}", output::render_probe(&outcome));
            Ok(if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Seal(args) => {
            let record = connection::seal(args, &settings).await?;
            let json = serde_json::to_string_pretty(&record)?;
            match &args.output {
                Some(path) => {
                    tokio::fs::write(path, json).await?;
                    info!(connection_id = %record.id, output = %path.display(), "Sealed connection written");
                }
                None => println!("{json}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Encrypt(args) => {
            println!("{}", connection::encrypt(args)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::GenerateKey => {
            println!("base64:{}", CredentialCodec::generate_key());
            Ok(ExitCode::SUCCESS)
        }
        Command::Ingest(args) => {
            let snapshot = ingest::run(args, &settings).await.inspect_err(|e| {
                error!("Ingestion failed: {e:#}");
            })?;
            print!("{}", output::render_snapshot(&snapshot));
            Ok(output::exit_code_for(snapshot.status))
        }
    }
}
