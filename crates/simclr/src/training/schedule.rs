//! Per-step cosine-annealed learning rate.
//!
//! The schedule produces a multiplicative factor on the base learning rate:
//!
//! ```text
//! factor(k) = min + (1 − min) · ½ · (1 + cos(π · k / total))
//! ```
//!
//! so the factor is 1 at step 0 and `min` at `total`, with no restarts.

use std::f64::consts::PI;

/// Default floor of the multiplier; keeps the final steps from freezing.
pub const DEFAULT_MIN_LR_FACTOR: f64 = 1e-3;

/// Cosine multiplier at `step` of `total_steps`. Steps past the end stay at `min_factor`.
pub fn cosine_factor(step: usize, total_steps: usize, min_factor: f64) -> f64 {
    let progress = if total_steps == 0 {
        1.0
    } else {
        (step as f64 / total_steps as f64).min(1.0)
    };
    min_factor + (1.0 - min_factor) * 0.5 * (1.0 + (PI * progress).cos())
}

/// Step counter driving the cosine multiplier.
///
/// Starts at step 0 and is advanced exactly once per optimizer update.
#[derive(Debug, Clone)]
pub struct CosineSchedule {
    base_lr: f64,
    min_factor: f64,
    total_steps: usize,
    step: usize,
}

impl CosineSchedule {
    pub fn new(base_lr: f64, total_steps: usize, min_factor: f64) -> Self {
        Self {
            base_lr,
            min_factor,
            total_steps,
            step: 0,
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Multiplier for the current step.
    pub fn factor(&self) -> f64 {
        cosine_factor(self.step, self.total_steps, self.min_factor)
    }

    /// Learning rate for the current step.
    pub fn lr(&self) -> f64 {
        self.base_lr * self.factor()
    }

    pub fn advance(&mut self) {
        self.step += 1;
    }
}
