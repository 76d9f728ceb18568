use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use object_transfer::{
    connect, utils::init_logger, ClientConfig, StorageProvider, StorageTarget, TransferRequest,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "object-transfer", version, about = "Upload and download files to S3-compatible storage")]
struct Cli {
    /// Config file (toml, yaml or json); environment variables are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage backend override: s3 or mock
    #[arg(long, global = true)]
    provider: Option<StorageProvider>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a local file to bucket/key
    Upload {
        local_path: PathBuf,
        bucket: String,
        key: String,
    },
    /// Download bucket/key into a local file
    Download {
        bucket: String,
        key: String,
        local_path: PathBuf,
    },
}

impl Command {
    fn into_request(self) -> anyhow::Result<TransferRequest> {
        Ok(match self {
            Command::Upload { local_path, bucket, key } => {
                TransferRequest::upload(local_path, StorageTarget::new(bucket, key)?)
            }
            Command::Download { bucket, key, local_path } => {
                TransferRequest::download(StorageTarget::new(bucket, key)?, local_path)
            }
        })
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let request = cli.command.into_request()?;

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }

    let storage = connect(&config).context("Failed to initialize storage client")?;

    storage
        .transfer(&request)
        .await
        .with_context(|| format!("Failed to {}", request))?;

    info!("Completed {}", request);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload_with_provider() {
        let cli = Cli::try_parse_from([
            "object-transfer",
            "--provider",
            "mock",
            "upload",
            "test.txt",
            "mybucket",
            "test.txt",
        ])
        .unwrap();
        assert_eq!(cli.provider, Some(StorageProvider::Mock));

        let request = cli.command.into_request().unwrap();
        assert_eq!(request.to_string(), "upload test.txt -> s3://mybucket/test.txt");
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let cli = Cli::try_parse_from(["object-transfer", "download", "mybucket", "", "out.txt"])
            .unwrap();
        assert!(cli.command.into_request().is_err());
    }

    #[tokio::test]
    async fn test_invalid_target_reported_before_connecting() {
        // An unusable config file would fail if it were read first.
        let cli = Cli::try_parse_from([
            "object-transfer",
            "--config",
            "/nonexistent/object-transfer.toml",
            "upload",
            "test.txt",
            "",
            "test.txt",
        ])
        .unwrap();

        let err = run(cli).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<object_transfer::StorageError>(),
            Some(object_transfer::StorageError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let parsed = Cli::try_parse_from([
            "object-transfer",
            "--provider",
            "gcs",
            "download",
            "b",
            "k",
            "out.txt",
        ]);
        assert!(parsed.is_err());
    }
}
