//! Error type shared by the data pipeline, model construction and training.

/// Errors raised by the SimCLR library.
#[derive(Debug, thiserror::Error)]
pub enum SimclrError {
    /// Backbone name outside the supported set.
    #[error("unsupported backbone `{0}` (expected one of: resnet18, resnet34)")]
    UnsupportedBackbone(String),

    /// A configuration value that would make training undefined.
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Dataset index past the end of the base dataset.
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Malformed or missing dataset files.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Model record could not be written.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// The contrastive loss evaluated to NaN or infinity.
    #[error("non-finite loss at epoch {epoch}, step {step}")]
    NonFiniteLoss { epoch: usize, step: usize },

    /// IO error from dataset reads or worker spawning.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimclrError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SimclrError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
