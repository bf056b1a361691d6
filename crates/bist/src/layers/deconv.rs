//! # `UpsampleBlock` - transpose-conv/norm/relu upsampling block.
//!
//! A [`UpsampleBlock`] module is:
//! * a bias-free [`ConvTranspose2d`] layer padded for an exact `x stride`
//!   spatial upsample,
//! * a [`Normalization`] layer,
//! * an unconditional [`Relu`].
//!
//! Kernels are drawn from a truncated normal distribution with stddev
//! [`WEIGHTS_INIT_STDDEV`], under the caller's seed policy.

use crate::layers::norm::{BatchNorm2dConfig, Normalization, NormalizationConfig};
use crate::utility::init::{WEIGHTS_INIT_STDDEV, truncated_normal_kernel};
use crate::utility::shape::{stride_mul_resolution, transpose_same_padding};
use burn::module::Param;
use burn::nn::Relu;
use burn::nn::conv::{ConvTranspose2d, ConvTranspose2dConfig};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`UpsampleBlock`] Meta trait.
pub trait UpsampleBlockMeta {
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
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[in_height * stride, in_width * stride]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        stride_mul_resolution(input_resolution, self.stride())
    }
}

/// [`UpsampleBlock`] Config.
///
/// Implements [`UpsampleBlockMeta`].
#[derive(Config, Debug)]
pub struct UpsampleBlockConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// The square kernel size.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// The uniform spatial stride (upsampling factor).
    #[config(default = 2)]
    pub stride: usize,

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

impl UpsampleBlockMeta for UpsampleBlockConfig {
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

impl UpsampleBlockConfig {
    /// Initialize an [`UpsampleBlock`].
    ///
    /// Auto-matches the norm layer feature count to the conv output channels.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> UpsampleBlock<B> {
        let k = self.kernel_size;
        let (padding, padding_out) = transpose_same_padding(k, self.stride);

        let mut conv = ConvTranspose2dConfig::new([self.in_channels, self.out_channels], [k, k])
            .with_stride([self.stride, self.stride])
            .with_padding([padding, padding])
            .with_padding_out([padding_out, padding_out])
            .with_bias(false)
            .init(device);
        // Transpose kernels have the channel axes swapped relative to Conv2d.
        conv.weight = Param::from_tensor(truncated_normal_kernel(
            [self.in_channels, self.out_channels, k, k],
            WEIGHTS_INIT_STDDEV,
            self.seed,
            device,
        ));

        UpsampleBlock {
            conv,
            norm: self
                .norm
                .clone()
                .with_num_features(self.out_channels)
                .init(device),
            relu: Relu::new(),
        }
    }
}

/// Sequenced transpose-conv/norm/relu block.
///
/// Implements [`UpsampleBlockMeta`].
#[derive(Module, Debug)]
pub struct UpsampleBlock<B: Backend> {
    /// Internal ConvTranspose2d layer.
    pub conv: ConvTranspose2d<B>,

    /// Internal Norm layer.
    pub norm: Normalization<B>,

    /// Rectifying nonlinearity.
    pub relu: Relu,
}

impl<B: Backend> UpsampleBlockMeta for UpsampleBlock<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.conv.groups
    }

    fn kernel_size(&self) -> usize {
        self.conv.weight.shape().dims[2]
    }

    fn stride(&self) -> usize {
        self.conv.stride[0]
    }
}

impl<B: Backend> UpsampleBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, in_height * stride, in_width * stride]``
    ///
    /// # Panics
    ///
    /// If the input channel count does not match, or the transpose
    /// convolution misses the precomputed target resolution.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, channels, height, width] = input.dims();
        assert_eq!(
            channels,
            self.in_channels(),
            "input channels {channels} != block channels {}",
            self.in_channels(),
        );
        let [target_height, target_width] = self.output_resolution([height, width]);

        let x = self.conv.forward(input);

        let dims = x.dims();
        let target = [batch, self.out_channels(), target_height, target_width];
        assert_eq!(
            dims, target,
            "transpose convolution produced {dims:?}, target {target:?}",
        );

        let x = self.norm.forward(x);
        self.relu.forward(x)
    }
}
