//! Keyper executable.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use keyper_telemetry::{init_logging, TelemetryConfig};
use node_runtime::KeyperConfig;
use tracing::info;

/// Shutter keyper node
#[derive(Parser, Debug)]
#[command(name = "keyper")]
#[command(about = "Threshold decryption keyper for the Shutter network")]
struct Cli {
    /// Log filter, e.g. `info` or `kp_06_shuttermint=debug`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the keyper
    Run {
        /// Path to the TOML configuration
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Write a configuration with freshly generated keys
    GenerateConfig {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value = "1")]
        instance_id: u64,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = cli.log_level {
        telemetry = telemetry.with_log_level(level);
    }
    init_logging(&telemetry).context("failed to initialize logging")?;

    match cli.command {
        Command::Run { config } => {
            let config = KeyperConfig::load(&config)
                .with_context(|| format!("failed to load {}", config.display()))?;
            node_runtime::run(config).await.context("keyper stopped with error")
        }
        Command::GenerateConfig {
            output,
            instance_id,
            force,
        } => {
            if output.exists() && !force {
                bail!("{} exists, pass --force to overwrite", output.display());
            }
            let config = KeyperConfig::generate(instance_id);
            let address = config.address()?;
            std::fs::write(&output, config.to_toml()?)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!(%address, path = %output.display(), "[keyper] wrote configuration");
            Ok(())
        }
    }
}
