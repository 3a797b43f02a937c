mod accelerator;
mod config;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::TrainOverrides;
use pipeline::{ShowConfigArgs, TrainArgs};

/// Default location of the training config file.
const DEFAULT_CONFIG: &str = "configs/simclr.toml";

/// simclr: self-supervised contrastive pre-training on CIFAR-10.
#[derive(Parser)]
#[command(name = "simclr", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands for training and config inspection.
#[derive(Subcommand)]
enum Command {
    /// Train the encoder and projection head with the NT-Xent objective.
    Train {
        /// Path to the training config TOML file.
        #[arg(long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        overrides: TrainOverrides,
    },
    /// Print the resolved training config (defaults < TOML < flags).
    ShowConfig {
        /// Path to the training config TOML file.
        #[arg(long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        overrides: TrainOverrides,
    },
}

/// Split an optional `--config` into a path and whether it was explicit.
fn config_path(config: Option<PathBuf>) -> (PathBuf, bool) {
    match config {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Train { config, overrides } => {
            let (config, config_explicit) = config_path(config);
            pipeline::run_train(TrainArgs {
                config,
                config_explicit,
                overrides,
            })
        }
        Command::ShowConfig { config, overrides } => {
            let (config, config_explicit) = config_path(config);
            pipeline::run_show_config(ShowConfigArgs {
                config,
                config_explicit,
                overrides,
            })
        }
    }
}
