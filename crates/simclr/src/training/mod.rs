//! SimCLR training: NT-Xent loss, cosine schedule, loss bookkeeping,
//! checkpoints and the training loop.

pub mod checkpoint;
pub mod loss;
pub mod metrics;
pub mod schedule;
pub mod trainer;
