use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::relu;

/// Configuration for a ResNet built from basic (two 3x3 conv) blocks.
///
/// Uses the small-image stem: a single 3x3 stride-1 convolution with no
/// max-pool, so 32x32 inputs keep their resolution through the first stage.
/// The classification layer is omitted; the output is the pooled feature.
///
/// ```text
/// (batch, C, H, W)
///   → Conv3x3(C→w) → BN → ReLU
///   → stage 0: depth[0] blocks, w channels, stride 1
///   → stage i: depth[i] blocks, w·2^i channels, stride 2 on the first block
///   → AdaptiveAvgPool(1x1) → flatten
///   → (batch, w·2^(stages-1))
/// ```
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Number of basic blocks per stage.
    pub stage_depths: Vec<usize>,
    #[config(default = 3)]
    pub in_channels: usize,
    /// Channels of the first stage; doubled at every following stage.
    #[config(default = 64)]
    pub base_width: usize,
}

impl ResNetConfig {
    /// Width of the pooled output.
    pub fn output_channels(&self) -> usize {
        self.base_width << self.stage_depths.len().saturating_sub(1)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        let mut blocks = Vec::new();
        let mut in_ch = self.base_width;
        for (stage, &depth) in self.stage_depths.iter().enumerate() {
            let out_ch = self.base_width << stage;
            for i in 0..depth {
                let stride = if stage > 0 && i == 0 { 2 } else { 1 };
                blocks.push(BasicBlock::new(in_ch, out_ch, stride, device));
                in_ch = out_ch;
            }
        }

        ResNet {
            stem_conv: conv3x3(self.in_channels, self.base_width, 1, device),
            stem_bn: BatchNormConfig::new(self.base_width).init(device),
            blocks,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }
}

/// ResNet feature extractor.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    pub(crate) stem_conv: Conv2d<B>,
    stem_bn: BatchNorm<B, 2>,
    blocks: Vec<BasicBlock<B>>,
    pool: AdaptiveAvgPool2d,
}

impl<B: Backend> ResNet<B> {
    /// Input shape: `(batch, C, H, W)`
    /// Output shape: `(batch, feature_dim)`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.stem_bn.forward(self.stem_conv.forward(x)));
        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));
        self.pool.forward(x).flatten(1, 3)
    }
}

/// Two 3x3 convolutions with a residual connection.
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    /// 1x1 projection when the block changes resolution or width.
    shortcut: Option<Shortcut<B>>,
}

#[derive(Module, Debug)]
pub struct Shortcut<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> BasicBlock<B> {
    fn new(in_ch: usize, out_ch: usize, stride: usize, device: &B::Device) -> Self {
        let shortcut = (stride != 1 || in_ch != out_ch).then(|| Shortcut {
            conv: Conv2dConfig::new([in_ch, out_ch], [1, 1])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Valid)
                .with_bias(false)
                .init(device),
            bn: BatchNormConfig::new(out_ch).init(device),
        });

        BasicBlock {
            conv1: conv3x3(in_ch, out_ch, stride, device),
            bn1: BatchNormConfig::new(out_ch).init(device),
            conv2: conv3x3(out_ch, out_ch, 1, device),
            bn2: BatchNormConfig::new(out_ch).init(device),
            shortcut,
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.shortcut {
            Some(s) => s.bn.forward(s.conv.forward(x.clone())),
            None => x.clone(),
        };
        let out = relu(self.bn1.forward(self.conv1.forward(x)));
        let out = self.bn2.forward(self.conv2.forward(out));
        relu(out + identity)
    }
}

fn conv3x3<B: Backend>(in_ch: usize, out_ch: usize, stride: usize, device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new([in_ch, out_ch], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_bias(false)
        .init(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    fn tiny() -> ResNetConfig {
        ResNetConfig::new(vec![1, 1, 1]).with_base_width(4)
    }

    #[test]
    fn test_output_channels() {
        assert_eq!(ResNetConfig::new(vec![2, 2, 2, 2]).output_channels(), 512);
        assert_eq!(tiny().output_channels(), 16);
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = tiny().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([2, 3, 8, 8], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(model.forward(x).dims(), [2, 16]);
    }

    #[test]
    fn test_odd_resolution() {
        let device = Default::default();
        let model = tiny().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([1, 3, 7, 5], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(model.forward(x).dims(), [1, 16]);
    }

    #[test]
    fn test_deeper_config_has_more_params() {
        let device = Default::default();
        let r18 = ResNetConfig::new(vec![2, 2, 2, 2]).with_base_width(8).init::<TestBackend>(&device);
        let r34 = ResNetConfig::new(vec![3, 4, 6, 3]).with_base_width(8).init::<TestBackend>(&device);
        assert!(r34.num_params() > r18.num_params());
    }

    #[test]
    fn test_gradient_reaches_stem() {
        use burn::optim::GradientsParams;

        let device = Default::default();
        let model = tiny().init::<TestAutodiffBackend>(&device);
        let x = Tensor::<TestAutodiffBackend, 4>::random(
            [4, 3, 8, 8],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let loss = model.forward(x).powf_scalar(2.0).sum();
        let grads = GradientsParams::from_grads(loss.backward(), &model);

        let stem = grads
            .get::<NdArray<f32>, 4>(model.stem_conv.weight.id)
            .expect("stem conv weight should have gradient");
        let total: f32 = stem.abs().sum().into_scalar().elem();
        assert!(total > 0.0, "stem gradient is zero");
    }
}
