//! Data pipeline: base image datasets, augmentation, positive-pair sampling
//! and batch assembly.

pub mod augment;
pub mod cifar;
pub mod loader;
pub mod pair;
pub mod sample;
