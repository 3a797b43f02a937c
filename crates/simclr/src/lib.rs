//! Self-supervised contrastive pre-training (SimCLR) on burn.
//!
//! Two independent augmentations of each image form a positive pair; a batch
//! of N pairs is flattened to 2N views, encoded by a ResNet backbone and a
//! projection head, and trained with the NT-Xent loss under a cosine-annealed
//! SGD schedule.

pub mod data;
pub mod error;
pub mod model;
pub mod training;

pub use data::augment::{Augment, AugmentConfig, Normalize, SimclrAugment, View};
pub use data::cifar::{resolve_data_dir, Cifar10, Cifar10Split};
pub use data::loader::{PairBatch, PairBatcher, PairLoader};
pub use data::pair::{PairDataset, ViewPair};
pub use data::sample::ImageSample;
pub use error::SimclrError;
pub use model::backbone::Backbone;
pub use model::simclr::{SimclrModel, SimclrModelConfig, SimclrOutput};
pub use training::checkpoint::{checkpoint_path, load_checkpoint, save_checkpoint};
pub use training::loss::nt_xent_loss;
pub use training::metrics::{AverageMeter, TrainingReport};
pub use training::schedule::CosineSchedule;
pub use training::trainer::{train, SimclrTrainingConfig, TrainOutcome};
