//! # Residual Block
//!
//! [`ResidualBlock`] is the transformation unit at the core of the style
//! transfer network: two "same"-padded convolutions at the fixed
//! [`RESIDUAL_WIDTH`], added element-wise to the block input.

use crate::layers::conv::{ConvBlock, ConvBlockConfig, ConvBlockMeta};
use crate::layers::norm::{BatchNorm2dConfig, NormalizationConfig};
use burn::prelude::{Backend, Config, Module, Tensor};

/// The fixed channel width of the residual chain.
pub const RESIDUAL_WIDTH: usize = 128;

/// [`ResidualBlock`] Config.
#[derive(Config, Debug)]
pub struct ResidualBlockConfig {
    /// The square kernel size of both convolutions.
    #[config(default = 3)]
    pub kernel_size: usize,

    /// [`crate::layers::norm::Normalization`] config.
    ///
    /// The feature size of this config will be replaced with
    /// [`RESIDUAL_WIDTH`].
    #[config(default = "NormalizationConfig::Batch(BatchNorm2dConfig::new(0))")]
    pub norm: NormalizationConfig,

    /// Base kernel initialization seed; a seeded block draws its two kernels
    /// from `seed` and `seed + 1`.
    #[config(default = "None")]
    pub seed: Option<u64>,
}

impl ResidualBlockConfig {
    /// Initialize a [`ResidualBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualBlock<B> {
        let conv = |relu: bool, seed: Option<u64>| {
            ConvBlockConfig::new(RESIDUAL_WIDTH, RESIDUAL_WIDTH)
                .with_kernel_size(self.kernel_size)
                .with_relu(relu)
                .with_norm(self.norm.clone())
                .with_seed(seed)
        };

        ResidualBlock {
            conv1: conv(true, self.seed).init(device),
            conv2: conv(false, self.seed.map(|seed| seed + 1)).init(device),
        }
    }
}

/// Shape-preserving residual unit.
///
/// The output is the input plus a learned perturbation:
/// a rectified conv/norm block followed by a linear conv/norm block.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    /// First conv/norm block, with relu.
    pub conv1: ConvBlock<B>,

    /// Second conv/norm block, without relu.
    pub conv2: ConvBlock<B>,
}

impl<B: Backend> ResidualBlock<B> {
    /// The square kernel size of both convolutions.
    pub fn kernel_size(&self) -> usize {
        self.conv1.kernel_size()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, RESIDUAL_WIDTH, height, width]``.
    ///
    /// # Returns
    ///
    /// A tensor of identical shape.
    ///
    /// # Panics
    ///
    /// If the input does not have [`RESIDUAL_WIDTH`] channels.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let channels = input.dims()[1];
        assert_eq!(
            channels, RESIDUAL_WIDTH,
            "residual blocks require {RESIDUAL_WIDTH} input channels, got {channels}",
        );

        let skip = input.clone();
        skip + self.conv2.forward(self.conv1.forward(input))
    }
}
