//! # Image Transformation Network
//!
//! [`TransformNet`] is the feed-forward network of fast neural style
//! transfer: it maps a batch of images to stylized images of the same
//! resolution.
//!
//! The pipeline is strictly sequential:
//! three downsampling convolutions, five residual blocks at the bottleneck
//! resolution, two transpose-convolution upsamples, a final convolution back
//! to 3 channels, and a bounded output nonlinearity.
//!
//! [`TransformNetConfig`] implements [`Config`], and provides
//! [`TransformNetConfig::init`] to initialize a [`TransformNet`].
//!
//! [`TransformNet`] implements [`Module`], and provides
//! [`TransformNet::forward`].

use crate::layers::conv::{ConvBlock, ConvBlockConfig};
use crate::layers::deconv::{UpsampleBlock, UpsampleBlockConfig};
use crate::layers::norm::{BatchNorm2dConfig, NormalizationConfig};
use crate::models::transfer::residual_block::{ResidualBlock, ResidualBlockConfig};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Channel widths of the three encoder convolutions.
pub const ENCODER_WIDTHS: [usize; 3] = [32, 64, 128];

/// Number of residual blocks at the bottleneck resolution.
pub const NUM_RESIDUAL_BLOCKS: usize = 5;

/// Scale applied to the output tanh.
pub const OUTPUT_SCALE: f64 = 150.0;

/// Shift applied to the scaled output tanh.
pub const OUTPUT_SHIFT: f64 = 127.5;

/// Downsampling factor of the encoder; input resolutions must divide it.
pub const DOWNSAMPLE_FACTOR: usize = 4;

/// [`TransformNet`] Config.
#[derive(Config, Debug)]
pub struct TransformNetConfig {
    /// [`crate::layers::norm::Normalization`] config.
    ///
    /// Selects the normalization mode shared by every layer;
    /// the feature size is matched per layer.
    #[config(default = "NormalizationConfig::Batch(BatchNorm2dConfig::new(0))")]
    pub norm: NormalizationConfig,

    /// Base kernel initialization seed.
    ///
    /// `Some` derives a distinct deterministic seed per kernel;
    /// `None` draws every kernel from OS entropy.
    #[config(default = "None")]
    pub seed: Option<u64>,
}

impl TransformNetConfig {
    /// Initialize a [`TransformNet`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> TransformNet<B> {
        let [w1, w2, w3] = ENCODER_WIDTHS;

        // One slot per kernel draw; residual blocks consume two slots.
        let seed_at = |slot: u64| self.seed.map(|base| base + slot);
        let residual_slots = 2 * NUM_RESIDUAL_BLOCKS as u64;

        TransformNet {
            conv1: ConvBlockConfig::new(3, w1)
                .with_kernel_size(9)
                .with_norm(self.norm.clone())
                .with_seed(seed_at(0))
                .init(device),
            conv2: ConvBlockConfig::new(w1, w2)
                .with_stride(2)
                .with_norm(self.norm.clone())
                .with_seed(seed_at(1))
                .init(device),
            conv3: ConvBlockConfig::new(w2, w3)
                .with_stride(2)
                .with_norm(self.norm.clone())
                .with_seed(seed_at(2))
                .init(device),

            residuals: (0..NUM_RESIDUAL_BLOCKS)
                .map(|index| {
                    ResidualBlockConfig::new()
                        .with_norm(self.norm.clone())
                        .with_seed(seed_at(3 + 2 * index as u64))
                        .init(device)
                })
                .collect(),

            up1: UpsampleBlockConfig::new(w3, w2)
                .with_norm(self.norm.clone())
                .with_seed(seed_at(3 + residual_slots))
                .init(device),
            up2: UpsampleBlockConfig::new(w2, w1)
                .with_norm(self.norm.clone())
                .with_seed(seed_at(4 + residual_slots))
                .init(device),

            output: ConvBlockConfig::new(w1, 3)
                .with_kernel_size(9)
                .with_relu(false)
                .with_norm(self.norm.clone())
                .with_seed(seed_at(5 + residual_slots))
                .init(device),
        }
    }
}

/// The image transformation network.
///
/// Every learned parameter of the model lives in this module tree; `init`
/// returns the complete parameter container.
#[derive(Module, Debug)]
pub struct TransformNet<B: Backend> {
    /// Encoder: 3 -> 32 channels, 9x9, stride 1.
    pub conv1: ConvBlock<B>,

    /// Encoder: 32 -> 64 channels, 3x3, stride 2.
    pub conv2: ConvBlock<B>,

    /// Encoder: 64 -> 128 channels, 3x3, stride 2.
    pub conv3: ConvBlock<B>,

    /// Transformation core at the bottleneck resolution.
    pub residuals: Vec<ResidualBlock<B>>,

    /// Decoder: 128 -> 64 channels, x2 upsample.
    pub up1: UpsampleBlock<B>,

    /// Decoder: 64 -> 32 channels, x2 upsample.
    pub up2: UpsampleBlock<B>,

    /// Final convolution: 32 -> 3 channels, 9x9, stride 1, no relu.
    pub output: ConvBlock<B>,
}

impl<B: Backend> TransformNet<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, height, width]``; height and width must be
    ///   multiples of [`DOWNSAMPLE_FACTOR`] so the two stride-2 round trips
    ///   restore the input resolution exactly.
    ///
    /// # Returns
    ///
    /// A ``[batch, 3, height, width]`` tensor of pixel values.
    ///
    /// The output stage is ``tanh(x) * 150 + 127.5``: nominally [0, 255],
    /// actually bounded by [-22.5, 277.5]. The historical formula is kept
    /// as-is; callers wanting strict pixel range must clamp.
    ///
    /// # Panics
    ///
    /// If the input is not a 3-channel image batch with height and width
    /// divisible by [`DOWNSAMPLE_FACTOR`].
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [_, channels, height, width] = input.dims();
        assert_eq!(channels, 3, "expected a 3-channel image batch, got {channels} channels");
        assert!(
            height % DOWNSAMPLE_FACTOR == 0 && width % DOWNSAMPLE_FACTOR == 0,
            "input resolution {height}x{width} must be a multiple of {DOWNSAMPLE_FACTOR}",
        );

        let x = self.conv1.forward(input);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);

        let x = self
            .residuals
            .iter()
            .fold(x, |x, block| block.forward(x));

        let x = self.up1.forward(x);
        let x = self.up2.forward(x);
        let x = self.output.forward(x);

        x.tanh().mul_scalar(OUTPUT_SCALE).add_scalar(OUTPUT_SHIFT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::norm::InstanceNorm2dConfig;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    fn image_batch(shape: [usize; 4]) -> Tensor<B, 4> {
        let device = Default::default();
        Tensor::random(shape, Distribution::Uniform(0.0, 255.0), &device)
    }

    #[test]
    fn test_output_shape_matches_input_shape() {
        let device = Default::default();

        let net: TransformNet<B> = TransformNetConfig::new()
            .with_seed(Some(0))
            .init(&device);

        let output = net.forward(image_batch([2, 3, 32, 24]));
        assert_eq!(output.dims(), [2, 3, 32, 24]);
    }

    #[test]
    fn test_instance_mode_output_shape() {
        let device = Default::default();

        let net: TransformNet<B> = TransformNetConfig::new()
            .with_norm(InstanceNorm2dConfig::new(0).into())
            .with_seed(Some(0))
            .init(&device);

        let output = net.forward(image_batch([1, 3, 256, 256]));
        assert_eq!(output.dims(), [1, 3, 256, 256]);
    }

    #[test]
    fn test_output_values_are_bounded() {
        let device = Default::default();

        let net: TransformNet<B> = TransformNetConfig::new()
            .with_seed(Some(1))
            .init(&device);

        let output = net.forward(image_batch([1, 3, 16, 16]));

        // tanh(x) * 150 + 127.5 lands in [-22.5, 277.5], not [0, 255].
        let min: f32 = output.clone().min().into_scalar();
        let max: f32 = output.max().into_scalar();
        assert!(min >= -22.5);
        assert!(max <= 277.5);
    }

    #[test]
    fn test_norm_modes_produce_different_outputs() {
        let device = Default::default();

        let input = image_batch([2, 3, 16, 16]);

        // Same seed: identical kernels, differing only in normalization.
        let batch: TransformNet<B> = TransformNetConfig::new()
            .with_seed(Some(42))
            .init(&device);
        let instance: TransformNet<B> = TransformNetConfig::new()
            .with_norm(InstanceNorm2dConfig::new(0).into())
            .with_seed(Some(42))
            .init(&device);

        let max_diff: f32 = batch
            .forward(input.clone())
            .sub(instance.forward(input))
            .abs()
            .max()
            .into_scalar();
        assert!(max_diff > 1e-3);
    }

    #[test]
    fn test_seeded_nets_are_reproducible() {
        let device = Default::default();

        let input = image_batch([1, 3, 16, 16]);

        let a: TransformNet<B> = TransformNetConfig::new().with_seed(Some(7)).init(&device);
        let b: TransformNet<B> = TransformNetConfig::new().with_seed(Some(7)).init(&device);

        a.forward(input.clone())
            .to_data()
            .assert_eq(&b.forward(input).to_data(), true);
    }

    #[test]
    fn test_network_structure() {
        let device = Default::default();

        let net: TransformNet<B> = TransformNetConfig::new().with_seed(Some(0)).init(&device);

        assert_eq!(net.residuals.len(), NUM_RESIDUAL_BLOCKS);
        assert!(net.conv1.relu.is_some());
        assert!(net.conv2.relu.is_some());
        assert!(net.conv3.relu.is_some());
        assert!(net.output.relu.is_none());
    }

    #[test]
    #[should_panic(expected = "must be a multiple of 4")]
    fn test_indivisible_resolution_panics() {
        let device = Default::default();

        let net: TransformNet<B> = TransformNetConfig::new().with_seed(Some(0)).init(&device);
        let _ = net.forward(image_batch([1, 3, 30, 30]));
    }

    #[test]
    #[should_panic(expected = "expected a 3-channel image batch, got 1 channels")]
    fn test_non_rgb_input_panics() {
        let device = Default::default();

        let net: TransformNet<B> = TransformNetConfig::new().with_seed(Some(0)).init(&device);
        let input = Tensor::ones([1, 1, 16, 16], &device);
        let _ = net.forward(input);
    }
}
