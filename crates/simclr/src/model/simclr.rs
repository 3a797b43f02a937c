use burn::prelude::*;

use super::backbone::Backbone;
use super::projector::{Projector, ProjectorConfig};
use super::resnet::ResNet;

/// Configuration for the encoder + projection head.
#[derive(Config, Debug)]
pub struct SimclrModelConfig {
    pub backbone: Backbone,
    /// Output dimension of the projection head.
    #[config(default = 128)]
    pub projection_dim: usize,
    /// Hidden width of the projection head.
    #[config(default = 2048)]
    pub hidden_dim: usize,
}

impl SimclrModelConfig {
    pub fn feature_dim(&self) -> usize {
        self.backbone.feature_dim()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SimclrModel<B> {
        SimclrModel {
            encoder: self.backbone.init(device),
            projector: ProjectorConfig::new(self.feature_dim(), self.projection_dim)
                .with_d_hidden(self.hidden_dim)
                .init(device),
        }
    }
}

/// Backbone features and their projections for one batch of views.
#[derive(Debug, Clone)]
pub struct SimclrOutput<B: Backend> {
    /// Shape `(2N, feature_dim)`.
    pub features: Tensor<B, 2>,
    /// Shape `(2N, projection_dim)`; the only input to the contrastive loss.
    pub projections: Tensor<B, 2>,
}

/// Backbone encoder followed by a projection head.
///
/// Batch-norm layers use batch statistics whenever the backend is an
/// autodiff backend, which is how the training loop runs it.
#[derive(Module, Debug)]
pub struct SimclrModel<B: Backend> {
    pub(crate) encoder: ResNet<B>,
    pub(crate) projector: Projector<B>,
}

impl<B: Backend> SimclrModel<B> {
    /// Input shape: `(2N, C, H, W)`
    pub fn forward(&self, views: Tensor<B, 4>) -> SimclrOutput<B> {
        let features = self.encoder.forward(views);
        let projections = self.projector.forward(features.clone());
        SimclrOutput {
            features,
            projections,
        }
    }
}
