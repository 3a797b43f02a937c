//! TOML config loading for the SimCLR CLI.
//!
//! Deserializes a flat `configs/simclr.toml` (every key optional), then
//! layers CLI flags on top. Priority chain: library defaults < TOML < CLI.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use simclr::{Backbone, SimclrTrainingConfig};

/// Dataset directory used when neither the TOML file nor the CLI sets one.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Optional training settings, shared by the TOML file and the `train` flags.
///
/// All fields are `Option` so that an unset key falls through to the next
/// lower layer.
#[derive(Debug, Default, Clone, Deserialize, Args)]
#[serde(deny_unknown_fields)]
pub struct TrainOverrides {
    /// Directory holding (or containing) `cifar-10-batches-bin`.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Image pairs per batch.
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Batch-assembly worker threads (0 = inline).
    #[arg(long)]
    pub workers: Option<usize>,
    /// Backbone name: resnet18 or resnet34.
    #[arg(long)]
    pub backbone: Option<String>,
    /// Output dimension of the projection head.
    #[arg(long)]
    pub projection_dim: Option<usize>,
    /// Peak learning rate.
    #[arg(long)]
    pub learning_rate: Option<f64>,
    /// SGD momentum (Nesterov).
    #[arg(long)]
    pub momentum: Option<f64>,
    /// L2 weight decay.
    #[arg(long)]
    pub weight_decay: Option<f64>,
    /// NT-Xent temperature.
    #[arg(long)]
    pub temperature: Option<f64>,
    /// Number of training epochs.
    #[arg(long)]
    pub epochs: Option<usize>,
    /// Save a checkpoint every this many epochs.
    #[arg(long)]
    pub log_interval: Option<usize>,
    /// Directory checkpoints are written to.
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,
    /// Final learning-rate multiplier of the cosine schedule.
    #[arg(long)]
    pub min_lr_factor: Option<f64>,
    /// RNG seed for shuffling and augmentation.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl TrainOverrides {
    /// Fill every unset field of `self` from `lower`.
    pub fn or(self, lower: TrainOverrides) -> TrainOverrides {
        TrainOverrides {
            data_dir: self.data_dir.or(lower.data_dir),
            batch_size: self.batch_size.or(lower.batch_size),
            workers: self.workers.or(lower.workers),
            backbone: self.backbone.or(lower.backbone),
            projection_dim: self.projection_dim.or(lower.projection_dim),
            learning_rate: self.learning_rate.or(lower.learning_rate),
            momentum: self.momentum.or(lower.momentum),
            weight_decay: self.weight_decay.or(lower.weight_decay),
            temperature: self.temperature.or(lower.temperature),
            epochs: self.epochs.or(lower.epochs),
            log_interval: self.log_interval.or(lower.log_interval),
            checkpoint_dir: self.checkpoint_dir.or(lower.checkpoint_dir),
            min_lr_factor: self.min_lr_factor.or(lower.min_lr_factor),
            seed: self.seed.or(lower.seed),
        }
    }
}

/// Fully resolved settings for one training run.
#[derive(Debug)]
pub struct ResolvedTrain {
    /// Absolute dataset directory.
    pub data_dir: PathBuf,
    pub training: SimclrTrainingConfig,
}

/// Load and deserialize a `TrainOverrides` from a TOML file.
pub fn load_train_toml(path: &Path) -> anyhow::Result<TrainOverrides> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: TrainOverrides = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    tracing::info!(path = %path.display(), "Loaded training config");
    Ok(config)
}

/// Build the training config from library defaults, TOML values and CLI flags.
///
/// A missing TOML file is only an error when `config_path` was given
/// explicitly.
pub fn build_train_config(
    config_path: &Path,
    explicit: bool,
    cli: TrainOverrides,
) -> anyhow::Result<ResolvedTrain> {
    let file = if config_path.exists() || explicit {
        load_train_toml(config_path)?
    } else {
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        TrainOverrides::default()
    };
    resolve(cli.or(file))
}

/// Apply a merged override set on top of `SimclrTrainingConfig` defaults.
pub fn resolve(overrides: TrainOverrides) -> anyhow::Result<ResolvedTrain> {
    let mut config = SimclrTrainingConfig::new();

    if let Some(name) = overrides.backbone {
        config.backbone = name.parse::<Backbone>()?;
    }
    if let Some(n) = overrides.batch_size {
        config.batch_size = n;
    }
    if let Some(n) = overrides.workers {
        config.workers = n;
    }
    if let Some(n) = overrides.projection_dim {
        config.projection_dim = n;
    }
    if let Some(v) = overrides.learning_rate {
        config.learning_rate = v;
    }
    if let Some(v) = overrides.momentum {
        config.momentum = v;
    }
    if let Some(v) = overrides.weight_decay {
        config.weight_decay = v;
    }
    if let Some(v) = overrides.temperature {
        config.temperature = v;
    }
    if let Some(n) = overrides.epochs {
        config.epochs = n;
    }
    if let Some(n) = overrides.log_interval {
        config.log_interval = n;
    }
    if let Some(dir) = overrides.checkpoint_dir {
        config.checkpoint_dir = dir.to_string_lossy().into_owned();
    }
    if let Some(v) = overrides.min_lr_factor {
        config.min_lr_factor = v;
    }
    config.seed = overrides.seed;

    config.validate()?;

    let data_dir = overrides
        .data_dir
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let data_dir = simclr::resolve_data_dir(&data_dir)
        .context("failed to resolve data directory")?;

    Ok(ResolvedTrain {
        data_dir,
        training: config,
    })
}
