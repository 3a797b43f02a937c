//! Loss bookkeeping for the training loop.

use std::path::PathBuf;

/// Running weighted average of a scalar metric.
#[derive(Debug, Clone, Default)]
pub struct AverageMeter {
    sum: f64,
    count: usize,
}

impl AverageMeter {
    /// Record `value` as the mean over `n` items.
    pub fn update(&mut self, value: f64, n: usize) {
        self.sum += value * n as f64;
        self.count += n;
    }

    /// Weighted mean of everything recorded; 0 when empty.
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Total weight recorded so far.
    pub fn count(&self) -> usize {
        self.count
    }
}

/// Summary of one finished epoch.
#[derive(Debug, Clone)]
pub struct EpochSummary {
    pub epoch: usize,
    pub avg_loss: f64,
    pub steps: usize,
    /// Learning rate used by the epoch's last step.
    pub last_lr: f64,
}

/// What a training run did.
#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    /// Optimizer updates performed (the final schedule step).
    pub global_steps: usize,
    pub epochs: Vec<EpochSummary>,
    pub checkpoints: Vec<PathBuf>,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.epochs.last().map(|e| e.avg_loss)
    }
}
