//! # `ConvBlock` - conv/norm/relu downsampling block.
//!
//! A [`ConvBlock`] module is:
//! * a bias-free "same"-padded [`Conv2d`] layer,
//! * a [`Normalization`] layer,
//! * an optional [`Relu`].
//!
//! Kernels are drawn from a zero-mean normal distribution with stddev
//! [`WEIGHTS_INIT_STDDEV`], under the caller's seed policy.

use crate::layers::norm::{BatchNorm2dConfig, Normalization, NormalizationConfig};
use crate::utility::init::{WEIGHTS_INIT_STDDEV, normal_kernel};
use crate::utility::shape::{same_padding, stride_div_resolution};
use burn::module::Param;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{PaddingConfig2d, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`ConvBlock`] Meta trait.
pub trait ConvBlockMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// The square kernel size.
    fn kernel_size(&self) -> usize;

    /// The uniform spatial stride.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: \
    ///   ``[in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If the input resolution is not a multiple of the stride.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        stride_div_resolution(input_resolution, self.stride())
    }
}

/// [`ConvBlock`] Config.
///
/// Implements [`ConvBlockMeta`].
#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// The square kernel size.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// The uniform spatial stride.
    #[config(default = 1)]
    pub stride: usize,

    /// Whether to apply a rectifying nonlinearity after normalization.
    #[config(default = true)]
    pub relu: bool,

    /// [`Normalization`] config.
    ///
    /// The feature size of this config will be replaced with the
    /// block's output channel count.
    #[config(default = "NormalizationConfig::Batch(BatchNorm2dConfig::new(0))")]
    pub norm: NormalizationConfig,

    /// Kernel initialization seed; `None` draws from OS entropy.
    #[config(default = "None")]
    pub seed: Option<u64>,
}

impl ConvBlockMeta for ConvBlockConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl ConvBlockConfig {
    /// Initialize a [`ConvBlock`].
    ///
    /// Auto-matches the norm layer feature count to the conv output channels.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ConvBlock<B> {
        let k = self.kernel_size;
        let padding = same_padding(k);

        let mut conv = Conv2dConfig::new([self.in_channels, self.out_channels], [k, k])
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_bias(false)
            .init(device);
        conv.weight = Param::from_tensor(normal_kernel(
            [self.out_channels, self.in_channels, k, k],
            WEIGHTS_INIT_STDDEV,
            self.seed,
            device,
        ));

        ConvBlock {
            conv,
            norm: self
                .norm
                .clone()
                .with_num_features(self.out_channels)
                .init(device),
            relu: self.relu.then(Relu::new),
        }
    }
}

/// Sequenced conv/norm/relu block.
///
/// Implements [`ConvBlockMeta`].
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Internal Norm layer.
    pub norm: Normalization<B>,

    /// Optional rectifying nonlinearity.
    pub relu: Option<Relu>,
}

impl<B: Backend> ConvBlockMeta for ConvBlock<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn kernel_size(&self) -> usize {
        self.conv.weight.shape().dims[2]
    }

    fn stride(&self) -> usize {
        self.conv.stride[0]
    }
}

impl<B: Backend> ConvBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: \
    ///   ``[batch, in_channels, in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If the input channel count does not match, or the input resolution is
    /// not a multiple of the stride.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [_, channels, height, width] = input.dims();
        assert_eq!(
            channels,
            self.in_channels(),
            "input channels {channels} != block channels {}",
            self.in_channels(),
        );
        let _ = self.output_resolution([height, width]);

        let x = self.conv.forward(input);
        let x = self.norm.forward(x);
        match &self.relu {
            Some(relu) => relu.forward(x),
            None => x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    #[test]
    fn test_conv_block_config() {
        let config = ConvBlockConfig::new(3, 32).with_kernel_size(9);
        assert_eq!(config.in_channels(), 3);
        assert_eq!(config.out_channels(), 32);
        assert_eq!(config.kernel_size(), 9);
        assert_eq!(config.stride(), 1);
        assert!(config.relu);
        assert_eq!(config.output_resolution([16, 16]), [16, 16]);

        let config = config.with_stride(2).with_relu(false);
        assert_eq!(config.output_resolution([16, 16]), [8, 8]);
        assert!(!config.relu);
    }

    #[test]
    fn test_conv_block_meta() {
        let device = Default::default();

        let block: ConvBlock<B> = ConvBlockConfig::new(3, 32)
            .with_kernel_size(9)
            .with_stride(2)
            .init(&device);

        assert_eq!(block.in_channels(), 3);
        assert_eq!(block.out_channels(), 32);
        assert_eq!(block.kernel_size(), 9);
        assert_eq!(block.stride(), 2);
        assert_eq!(block.norm.num_features(), 32);
        assert!(block.relu.is_some());
    }

    #[test]
    fn test_forward_preserves_resolution_at_stride_1() {
        let device = Default::default();

        let block: ConvBlock<B> = ConvBlockConfig::new(3, 8)
            .with_kernel_size(9)
            .with_seed(Some(0))
            .init(&device);

        let input = Tensor::random([2, 3, 12, 16], Distribution::Default, &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [2, 8, 12, 16]);
    }

    #[test]
    fn test_forward_halves_resolution_at_stride_2() {
        let device = Default::default();

        let block: ConvBlock<B> = ConvBlockConfig::new(4, 8)
            .with_stride(2)
            .with_seed(Some(0))
            .init(&device);

        let input = Tensor::random([1, 4, 16, 8], Distribution::Default, &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [1, 8, 8, 4]);
    }

    #[test]
    fn test_relu_clamps_negatives() {
        let device = Default::default();

        let config = ConvBlockConfig::new(2, 4).with_seed(Some(5));

        let input = Tensor::random([2, 2, 8, 8], Distribution::Default, &device);

        let rectified: ConvBlock<B> = config.clone().init(&device);
        let min: f32 = rectified.forward(input.clone()).min().into_scalar();
        assert!(min >= 0.0);

        // Without the relu, the normalized output must go negative.
        let linear: ConvBlock<B> = config.with_relu(false).init(&device);
        let min: f32 = linear.forward(input).min().into_scalar();
        assert!(min < 0.0);
    }

    #[test]
    fn test_seeded_blocks_are_reproducible() {
        let device = Default::default();

        let config = ConvBlockConfig::new(2, 4).with_seed(Some(11));
        let a: ConvBlock<B> = config.clone().init(&device);
        let b: ConvBlock<B> = config.init(&device);

        a.conv
            .weight
            .val()
            .to_data()
            .assert_eq(&b.conv.weight.val().to_data(), true);
    }

    #[test]
    #[should_panic(expected = "input channels 2 != block channels 3")]
    fn test_channel_mismatch_panics() {
        let device = Default::default();

        let block: ConvBlock<B> = ConvBlockConfig::new(3, 8).init(&device);
        let input = Tensor::ones([1, 2, 8, 8], &device);
        let _ = block.forward(input);
    }

    #[test]
    #[should_panic(expected = "not a multiple of stride")]
    fn test_indivisible_resolution_panics() {
        let device = Default::default();

        let block: ConvBlock<B> = ConvBlockConfig::new(3, 8).with_stride(2).init(&device);
        let input = Tensor::ones([1, 3, 7, 8], &device);
        let _ = block.forward(input);
    }
}
