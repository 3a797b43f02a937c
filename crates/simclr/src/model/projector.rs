use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// Configuration for the projection head.
///
/// ```text
/// (batch, d_feature) → Linear(d_feature→d_hidden) → ReLU → Linear(d_hidden→d_projection)
/// ```
#[derive(Config, Debug)]
pub struct ProjectorConfig {
    pub d_feature: usize,
    pub d_projection: usize,
    #[config(default = 2048)]
    pub d_hidden: usize,
}

/// Two-layer MLP mapping backbone features into the contrastive space.
#[derive(Module, Debug)]
pub struct Projector<B: Backend> {
    pub(crate) linear1: Linear<B>,
    pub(crate) linear2: Linear<B>,
}

impl ProjectorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Projector<B> {
        Projector {
            linear1: LinearConfig::new(self.d_feature, self.d_hidden).init(device),
            linear2: LinearConfig::new(self.d_hidden, self.d_projection).init(device),
        }
    }
}

impl<B: Backend> Projector<B> {
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.linear1.forward(features));
        self.linear2.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_projection_shape() {
        let device = Default::default();
        let head = ProjectorConfig::new(32, 8).with_d_hidden(16).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 2>::random([5, 32], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(head.forward(x).dims(), [5, 8]);
    }

    #[test]
    fn test_parameter_count() {
        let device = Default::default();
        let head = ProjectorConfig::new(512, 128).init::<TestBackend>(&device);
        // 512*2048 + 2048 + 2048*128 + 128
        assert_eq!(head.num_params(), 1_050_624 + 262_272);
    }
}
