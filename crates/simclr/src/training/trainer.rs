//! SimCLR training loop: SGD with Nesterov momentum, cosine-annealed
//! learning rate, NT-Xent loss, periodic checkpoints.
//!
//! The optimization loop is strictly sequential; only batch assembly runs on
//! worker threads (see [`PairLoader`]).

use std::path::PathBuf;
use std::time::Instant;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::augment::Augment;
use crate::data::loader::{PairBatcher, PairLoader};
use crate::data::sample::ImageSample;
use crate::error::SimclrError;
use crate::model::backbone::Backbone;
use crate::model::simclr::{SimclrModel, SimclrModelConfig};
use crate::training::checkpoint::save_checkpoint;
use crate::training::loss::nt_xent_loss;
use crate::training::metrics::{AverageMeter, EpochSummary, TrainingReport};
use crate::training::schedule::CosineSchedule;

/// Configuration for SimCLR training.
#[derive(Config, Debug)]
pub struct SimclrTrainingConfig {
    /// Number of image pairs per batch (2x views reach the model).
    #[config(default = 512)]
    pub batch_size: usize,
    /// Batch-assembly worker threads; 0 assembles on the training thread.
    #[config(default = 16)]
    pub workers: usize,
    #[config(default = "Backbone::ResNet18")]
    pub backbone: Backbone,
    /// Output dimension of the projection head.
    #[config(default = 128)]
    pub projection_dim: usize,
    /// Peak (step 0) learning rate.
    #[config(default = 0.6)]
    pub learning_rate: f64,
    #[config(default = 0.9)]
    pub momentum: f64,
    #[config(default = 1e-6)]
    pub weight_decay: f64,
    /// NT-Xent temperature.
    #[config(default = 0.5)]
    pub temperature: f64,
    #[config(default = 1000)]
    pub epochs: usize,
    /// Checkpoint every `log_interval` epochs.
    #[config(default = 50)]
    pub log_interval: usize,
    /// Directory for checkpoint files.
    #[config(default = "String::from(\".\")")]
    pub checkpoint_dir: String,
    /// Final learning-rate multiplier of the cosine schedule.
    #[config(default = 1e-3)]
    pub min_lr_factor: f64,
    /// Seed for shuffling and augmentation; entropy when unset.
    pub seed: Option<u64>,
}

impl SimclrTrainingConfig {
    /// Reject values that would make training undefined.
    pub fn validate(&self) -> Result<(), SimclrError> {
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(SimclrError::invalid("temperature", format!("must be > 0, got {}", self.temperature)));
        }
        if self.batch_size == 0 {
            return Err(SimclrError::invalid("batch_size", "must be at least 1"));
        }
        if self.epochs == 0 {
            return Err(SimclrError::invalid("epochs", "must be at least 1"));
        }
        if self.log_interval == 0 {
            return Err(SimclrError::invalid("log_interval", "must be at least 1"));
        }
        if self.projection_dim == 0 {
            return Err(SimclrError::invalid("projection_dim", "must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(SimclrError::invalid("learning_rate", format!("must be > 0, got {}", self.learning_rate)));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(SimclrError::invalid("momentum", format!("must be in [0, 1), got {}", self.momentum)));
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(SimclrError::invalid("weight_decay", format!("must be >= 0, got {}", self.weight_decay)));
        }
        if !(self.min_lr_factor > 0.0 && self.min_lr_factor <= 1.0) {
            return Err(SimclrError::invalid("min_lr_factor", format!("must be in (0, 1], got {}", self.min_lr_factor)));
        }
        Ok(())
    }

    pub fn model_config(&self) -> SimclrModelConfig {
        SimclrModelConfig::new(self.backbone).with_projection_dim(self.projection_dim)
    }

    /// Whether the end of `epoch` (1-based) writes a checkpoint.
    pub fn should_checkpoint(&self, epoch: usize) -> bool {
        self.log_interval > 0 && epoch >= self.log_interval && epoch % self.log_interval == 0
    }
}

/// Trained model plus what happened during the run.
pub struct TrainOutcome<B: AutodiffBackend> {
    pub model: SimclrModel<B>,
    pub report: TrainingReport,
}

fn epoch_progress(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Run SimCLR training.
///
/// Every step: collate the next batch into `2N` interleaved views, forward
/// through encoder + projector, compute NT-Xent on the projections,
/// backpropagate, apply SGD at the scheduled learning rate, then advance the
/// schedule. Gradients are rebuilt from each step's loss, so nothing
/// accumulates between steps.
///
/// # Arguments
/// - `config`: training hyperparameters (validated before the first step)
/// - `model`: initialized model on an autodiff backend
/// - `loader`: batch assembler over the pair dataset
/// - `device`: device the batches are placed on
///
/// # Errors
/// Any data, loss or checkpoint failure aborts the run; nothing is retried.
pub fn train<B, D, A>(
    config: &SimclrTrainingConfig,
    mut model: SimclrModel<B>,
    loader: &PairLoader<D, A>,
    device: &B::Device,
) -> anyhow::Result<TrainOutcome<B>>
where
    B: AutodiffBackend,
    D: Dataset<ImageSample> + 'static,
    A: Augment + 'static,
{
    config.validate()?;

    let batches_per_epoch = loader.batches_per_epoch();
    if batches_per_epoch == 0 {
        return Err(SimclrError::invalid(
            "batch_size",
            format!(
                "dataset of {} images yields no full batch of {}",
                loader.dataset().len(),
                loader.batch_size()
            ),
        )
        .into());
    }
    let total_steps = config.epochs * batches_per_epoch;
    let checkpoint_dir = PathBuf::from(&config.checkpoint_dir);

    let mut optimizer = SgdConfig::new()
        .with_momentum(Some(
            MomentumConfig::new()
                .with_momentum(config.momentum)
                .with_dampening(0.0)
                .with_nesterov(true),
        ))
        .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay as f32)))
        .init();
    let mut schedule = CosineSchedule::new(config.learning_rate, total_steps, config.min_lr_factor);

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let batcher = PairBatcher::<B>::new(device.clone(), loader.dataset().view_shape());
    let mut report = TrainingReport::default();
    let train_start = Instant::now();

    tracing::info!(
        backbone = %config.backbone,
        images = loader.dataset().len(),
        batch_size = loader.batch_size(),
        batches_per_epoch,
        total_steps,
        temperature = config.temperature,
        "Starting SimCLR training"
    );

    for epoch in 1..=config.epochs {
        let mut loss_meter = AverageMeter::default();
        let mut last_lr = schedule.lr();
        let mut steps = 0usize;
        let pb = epoch_progress(batches_per_epoch);

        for pairs in loader.epoch(&mut rng)? {
            let batch = batcher.batch(pairs?);
            let [n_views, _, _, _] = batch.views.dims();

            last_lr = schedule.lr();
            let output = model.forward(batch.views);
            let loss = nt_xent_loss(output.projections, config.temperature);

            let loss_val: f64 = loss.clone().into_scalar().elem();
            if !loss_val.is_finite() {
                return Err(SimclrError::NonFiniteLoss {
                    epoch,
                    step: schedule.step(),
                }
                .into());
            }

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(last_lr, model, grads);
            schedule.advance();
            steps += 1;

            loss_meter.update(loss_val, n_views);
            pb.set_message(format!(
                "Train epoch {epoch}, SimCLR loss: {:.4}",
                loss_meter.avg()
            ));
            pb.inc(1);
        }
        pb.finish();

        tracing::debug!(
            epoch,
            steps,
            views = loss_meter.count(),
            lr = %format!("{last_lr:.3e}"),
            avg_loss = loss_meter.avg(),
            "Epoch finished"
        );
        report.epochs.push(EpochSummary {
            epoch,
            avg_loss: loss_meter.avg(),
            steps,
            last_lr,
        });

        if config.should_checkpoint(epoch) {
            let path = save_checkpoint(&model, &checkpoint_dir, config.backbone, epoch)?;
            tracing::info!(
                epoch,
                path = %path.display(),
                "==> Save checkpoint. Train epoch {epoch}, SimCLR loss: {:.4}",
                loss_meter.avg()
            );
            report.checkpoints.push(path);
        }
    }

    report.global_steps = schedule.step();
    tracing::info!(
        global_steps = report.global_steps,
        checkpoints = report.checkpoints.len(),
        elapsed_secs = format!("{:.1}", train_start.elapsed().as_secs_f64()),
        "Training complete"
    );

    Ok(TrainOutcome { model, report })
}
