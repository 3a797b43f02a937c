//! Wiring of the SimCLR training pipeline for the CLI.

use std::path::PathBuf;
use std::time::Instant;

use burn::backend::{Autodiff, Wgpu};

use simclr::{AugmentConfig, Cifar10, Cifar10Split, PairDataset, PairLoader};

use crate::accelerator;
use crate::config::{build_train_config, TrainOverrides};

/// Autodiff over the fused, autotuned wgpu backend.
type TrainBackend = Autodiff<Wgpu>;

/// Arguments for the `train` subcommand.
#[derive(Debug)]
pub struct TrainArgs {
    /// Path to the training config TOML file.
    pub config: PathBuf,
    /// Whether `config` was given on the command line.
    pub config_explicit: bool,
    /// CLI overrides, highest priority.
    pub overrides: TrainOverrides,
}

/// Arguments for the `show-config` subcommand.
#[derive(Debug)]
pub struct ShowConfigArgs {
    pub config: PathBuf,
    pub config_explicit: bool,
    pub overrides: TrainOverrides,
}

/// Run SimCLR pre-training on the CIFAR-10 training split.
pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let start = Instant::now();

    let device_info = accelerator::probe()?;
    tracing::info!(
        adapter = %device_info.name,
        backend = %device_info.backend,
        device_type = %device_info.device_type,
        device = ?device_info.device,
        "Using accelerator (kernel autotuning enabled)"
    );

    let resolved = build_train_config(&args.config, args.config_explicit, args.overrides)?;
    let config = resolved.training;

    let cifar = Cifar10::open(&resolved.data_dir, Cifar10Split::Train)?;
    let pairs = PairDataset::new(cifar, AugmentConfig::new().init());
    let loader = PairLoader::new(pairs, config.batch_size, config.workers)?;

    let device = device_info.device.clone();
    let model_config = config.model_config();
    let model = model_config.init::<TrainBackend>(&device);
    tracing::info!(
        data_dir = %resolved.data_dir.display(),
        backbone = %config.backbone,
        feature_dim = model_config.feature_dim(),
        projection_dim = config.projection_dim,
        images = loader.dataset().len(),
        batches_per_epoch = loader.batches_per_epoch(),
        total_steps = config.epochs * loader.batches_per_epoch(),
        workers = config.workers,
        "Model and data ready"
    );

    let outcome = simclr::train(&config, model, &loader, &device)?;

    tracing::info!(
        global_steps = outcome.report.global_steps,
        final_loss = outcome.report.final_loss().unwrap_or(f64::NAN),
        checkpoints = outcome.report.checkpoints.len(),
        elapsed_secs = format!("{:.1}", start.elapsed().as_secs_f64()),
        "SimCLR run finished"
    );
    Ok(())
}

/// Print the resolved configuration without touching data or devices.
pub fn run_show_config(args: ShowConfigArgs) -> anyhow::Result<()> {
    let resolved = build_train_config(&args.config, args.config_explicit, args.overrides)?;
    println!("data_dir = {}", resolved.data_dir.display());
    println!("{}", resolved.training);
    Ok(())
}
