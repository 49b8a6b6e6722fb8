/*!
 * Stowage CLI
 *
 * Thin command-line front end over `ResilientStore`. Configuration comes from a TOML
 * file (`--config`) or the `MINIO_HOST` / `MINIO_USER` / `MINIO_PASSWORD` environment.
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use stowage::{logging, MinioAdmin, QuotaAdmin, ResilientStore, StorageConfig};

#[derive(Parser)]
#[command(name = "stowage")]
#[command(version, about = "Resilient client for S3-compatible object storage", long_about = None)]
struct Cli {
    /// TOML config file (defaults to MINIO_* environment variables)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Set a hard quota on a bucket through the admin API
    SetQuota { bucket: String, quota: String },

    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that run against a connected store
#[derive(Subcommand)]
enum StoreCommand {
    /// Write a probe object and report the result
    Health,

    /// Upload a file (or stdin with `-`)
    Put {
        bucket: String,
        key: String,
        #[arg(value_name = "FILE")]
        source: PathBuf,
    },

    /// Download an object to a file (or stdout)
    Get {
        bucket: String,
        key: String,
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Delete an object
    Rm { bucket: String, key: String },

    /// Exit 0 when the object exists, 1 when it does not
    Exists { bucket: String, key: String },

    /// Print object metadata
    Stat { bucket: String, key: String },

    /// Print a presigned download URL
    Presign {
        bucket: String,
        key: String,
        /// URL lifetime in seconds
        #[arg(long = "ttl", default_value_t = 3600)]
        ttl_secs: u64,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<StorageConfig> {
    let config = match path {
        Some(path) => StorageConfig::load(path)?,
        None => StorageConfig::from_env()?,
    };
    Ok(config)
}

fn read_source(source: &PathBuf) -> Result<Vec<u8>> {
    if source.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read(source).with_context(|| format!("Failed to read {}", source.display()))
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_ref())?;
    logging::init_logging(&config.log, cli.verbose)?;

    match cli.command {
        Command::SetQuota { bucket, quota } => {
            MinioAdmin::new(&config)?
                .set_bucket_quota(&bucket, &quota)
                .await?;
            println!("Quota of {} set for bucket '{}'", quota, bucket);
            Ok(ExitCode::SUCCESS)
        }
        Command::Store(command) => {
            let store = ResilientStore::connect(config).await?;
            run_store_command(&store, command).await
        }
    }
}

async fn run_store_command(store: &ResilientStore, command: StoreCommand) -> Result<ExitCode> {
    match command {
        StoreCommand::Health => {
            let receipt = store.health().await?;
            println!(
                "ok {}/{} etag={}",
                receipt.bucket,
                receipt.key,
                receipt.etag.as_deref().unwrap_or("-")
            );
        }
        StoreCommand::Put {
            bucket,
            key,
            source,
        } => {
            let data = read_source(&source)?;
            let size = data.len();
            let receipt = store.put(&bucket, &key, data).await?;
            println!(
                "{}/{} {} bytes etag={}",
                receipt.bucket,
                receipt.key,
                size,
                receipt.etag.as_deref().unwrap_or("-")
            );
        }
        StoreCommand::Get {
            bucket,
            key,
            output,
        } => {
            let data = store.get(&bucket, &key).await?;
            match output {
                Some(path) => std::fs::write(&path, &data)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => std::io::stdout().write_all(&data)?,
            }
        }
        StoreCommand::Rm { bucket, key } => store.remove(&bucket, &key).await?,
        StoreCommand::Exists { bucket, key } => {
            if !store.exists(&bucket, &key).await? {
                return Ok(ExitCode::from(1));
            }
        }
        StoreCommand::Stat { bucket, key } => {
            let stat = store.stat(&bucket, &key).await?;
            println!("size: {}", stat.size);
            println!("etag: {}", stat.etag.as_deref().unwrap_or("-"));
            println!(
                "content-type: {}",
                stat.content_type.as_deref().unwrap_or("-")
            );
        }
        StoreCommand::Presign {
            bucket,
            key,
            ttl_secs,
        } => {
            let url = store
                .presign(&bucket, &key, Duration::from_secs(ttl_secs))
                .await?;
            println!("{}", url);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
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
    fn test_set_quota_is_separate_from_store_commands() {
        let cli = Cli::try_parse_from(["stowage", "set-quota", "docs", "5GB"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::SetQuota { ref bucket, ref quota } if bucket == "docs" && quota == "5GB"
        ));

        let cli = Cli::try_parse_from(["stowage", "presign", "docs", "a.txt", "--ttl", "60"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Store(StoreCommand::Presign { ttl_secs: 60, .. })
        ));

        let cli = Cli::try_parse_from(["stowage", "-v", "health"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Store(StoreCommand::Health)));
    }
}
