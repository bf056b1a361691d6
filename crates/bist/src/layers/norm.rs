//! # Batch / Instance Normalization
//!
//! The two normalization variants of the style transfer network:
//! * [`BatchNorm2d`] - per-channel moments over the batch and spatial axes.
//! * [`InstanceNorm2d`] - per-channel moments over the spatial axes only,
//!   computed independently for each batch element.
//!
//! Both apply the same affine formula:
//!
//! ```text
//! scale * (x - mean) / sqrt(var + epsilon) + shift
//! ```
//!
//! with a biased variance and the epsilon added to the variance before the
//! square root. Statistics always come from the current input; there are no
//! running statistics and no separate inference mode.
//!
//! [`Normalization`] is the mode selector wrapper: a network is configured
//! with exactly one variant, used by every layer of its forward pass.

use burn::module::Param;
use burn::prelude::{Backend, Config, Module, Tensor};

/// Numerical stability constant added to the variance.
pub const DEFAULT_EPSILON: f64 = 1e-3;

/// Per-channel mean and biased variance over the given axes, keeping dims.
fn moments<B: Backend>(
    input: &Tensor<B, 4>,
    axes: &[usize],
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let mut mean = input.clone();
    for &axis in axes {
        mean = mean.mean_dim(axis);
    }

    let diff = input.clone().sub(mean.clone());
    let mut var = diff.clone().mul(diff);
    for &axis in axes {
        var = var.mean_dim(axis);
    }

    (mean, var)
}

/// Normalize over the given axes and apply the per-channel affine transform.
fn normalize<B: Backend>(
    input: Tensor<B, 4>,
    axes: &[usize],
    scale: &Param<Tensor<B, 1>>,
    shift: &Param<Tensor<B, 1>>,
    epsilon: f64,
) -> Tensor<B, 4> {
    let channels = input.dims()[1];
    let num_features = scale.shape().dims[0];
    assert_eq!(
        channels, num_features,
        "input channels {channels} != norm features {num_features}",
    );

    let (mean, var) = moments(&input, axes);

    // The epsilon lands on the variance before the square root.
    let normalized = input.sub(mean).div(var.add_scalar(epsilon).sqrt());

    let scale = scale.val().reshape([1, num_features, 1, 1]);
    let shift = shift.val().reshape([1, num_features, 1, 1]);
    normalized.mul(scale).add(shift)
}

/// [`BatchNorm2d`] Config.
#[derive(Config, Debug)]
pub struct BatchNorm2dConfig {
    /// The number of channels normalized over.
    pub num_features: usize,

    /// Numerical stability constant added to the variance.
    #[config(default = "DEFAULT_EPSILON")]
    pub epsilon: f64,
}

impl BatchNorm2dConfig {
    /// Initialize a [`BatchNorm2d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> BatchNorm2d<B> {
        BatchNorm2d {
            shift: Param::from_tensor(Tensor::zeros([self.num_features], device)),
            scale: Param::from_tensor(Tensor::ones([self.num_features], device)),
            epsilon: self.epsilon,
        }
    }
}

/// Batch normalization over a ``[batch, channels, height, width]`` tensor.
///
/// Moments are taken over every axis except the channel axis.
#[derive(Module, Debug)]
pub struct BatchNorm2d<B: Backend> {
    /// Learned per-channel shift (beta); zero-initialized.
    pub shift: Param<Tensor<B, 1>>,

    /// Learned per-channel scale (gamma); one-initialized.
    pub scale: Param<Tensor<B, 1>>,

    /// Numerical stability constant added to the variance.
    pub epsilon: f64,
}

impl<B: Backend> BatchNorm2d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, num_features, height, width]``.
    ///
    /// # Returns
    ///
    /// A normalized tensor of the same shape.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        normalize(input, &[0, 2, 3], &self.scale, &self.shift, self.epsilon)
    }

    /// Get the number of features.
    pub fn num_features(&self) -> usize {
        self.scale.shape().dims[0]
    }
}

/// [`InstanceNorm2d`] Config.
#[derive(Config, Debug)]
pub struct InstanceNorm2dConfig {
    /// The number of channels normalized over.
    pub num_features: usize,

    /// Numerical stability constant added to the variance.
    #[config(default = "DEFAULT_EPSILON")]
    pub epsilon: f64,
}

impl InstanceNorm2dConfig {
    /// Initialize an [`InstanceNorm2d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> InstanceNorm2d<B> {
        InstanceNorm2d {
            shift: Param::from_tensor(Tensor::zeros([self.num_features], device)),
            scale: Param::from_tensor(Tensor::ones([self.num_features], device)),
            epsilon: self.epsilon,
        }
    }
}

/// Instance normalization over a ``[batch, channels, height, width]`` tensor.
///
/// Moments are taken over the spatial axes only, per batch element, so the
/// output is independent of the other examples in the batch.
#[derive(Module, Debug)]
pub struct InstanceNorm2d<B: Backend> {
    /// Learned per-channel shift (beta); zero-initialized.
    pub shift: Param<Tensor<B, 1>>,

    /// Learned per-channel scale (gamma); one-initialized.
    pub scale: Param<Tensor<B, 1>>,

    /// Numerical stability constant added to the variance.
    pub epsilon: f64,
}

impl<B: Backend> InstanceNorm2d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, num_features, height, width]``.
    ///
    /// # Returns
    ///
    /// A normalized tensor of the same shape.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        normalize(input, &[2, 3], &self.scale, &self.shift, self.epsilon)
    }

    /// Get the number of features.
    pub fn num_features(&self) -> usize {
        self.scale.shape().dims[0]
    }
}

/// [`Normalization`] Configuration.
///
/// The normalization mode selector of the network; every layer of a model
/// instance shares one mode.
#[derive(Config, Debug)]
pub enum NormalizationConfig {
    /// [`BatchNorm2d`] Configuration.
    Batch(BatchNorm2dConfig),

    /// [`InstanceNorm2d`] Configuration.
    Instance(InstanceNorm2dConfig),
}

impl From<BatchNorm2dConfig> for NormalizationConfig {
    fn from(config: BatchNorm2dConfig) -> Self {
        Self::Batch(config)
    }
}

impl From<InstanceNorm2dConfig> for NormalizationConfig {
    fn from(config: InstanceNorm2dConfig) -> Self {
        Self::Instance(config)
    }
}

impl NormalizationConfig {
    /// Initialize a [`Normalization`] layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Normalization<B> {
        match self {
            NormalizationConfig::Batch(config) => config.init(device).into(),
            NormalizationConfig::Instance(config) => config.init(device).into(),
        }
    }

    /// Adjust a norm config to the feature size.
    pub fn with_num_features(
        self,
        num_features: usize,
    ) -> Self {
        match self {
            NormalizationConfig::Batch(config) => BatchNorm2dConfig {
                num_features,
                ..config
            }
            .into(),
            NormalizationConfig::Instance(config) => InstanceNorm2dConfig {
                num_features,
                ..config
            }
            .into(),
        }
    }

    /// Get the number of features.
    pub fn num_features(&self) -> usize {
        match self {
            NormalizationConfig::Batch(config) => config.num_features,
            NormalizationConfig::Instance(config) => config.num_features,
        }
    }
}

/// Normalization Layer Wrapper
///
/// Holds the normalization variant a model instance was configured with:
/// * [`Normalization::Batch`] - [`BatchNorm2d`]
/// * [`Normalization::Instance`] - [`InstanceNorm2d`]
#[derive(Module, Debug)]
pub enum Normalization<B: Backend> {
    /// [`BatchNorm2d`] layer.
    Batch(BatchNorm2d<B>),

    /// [`InstanceNorm2d`] layer.
    Instance(InstanceNorm2d<B>),
}

impl<B: Backend> From<BatchNorm2d<B>> for Normalization<B> {
    fn from(layer: BatchNorm2d<B>) -> Self {
        Self::Batch(layer)
    }
}

impl<B: Backend> From<InstanceNorm2d<B>> for Normalization<B> {
    fn from(layer: InstanceNorm2d<B>) -> Self {
        Self::Instance(layer)
    }
}

impl<B: Backend> Normalization<B> {
    /// Applies normalization to a tensor.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, num_features, height, width]``.
    ///
    /// # Returns
    ///
    /// A normalized tensor of the same shape.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Normalization::Batch(norm) => norm.forward(input),
            Normalization::Instance(norm) => norm.forward(input),
        }
    }

    /// Get the number of features.
    pub fn num_features(&self) -> usize {
        match self {
            Normalization::Batch(norm) => norm.num_features(),
            Normalization::Instance(norm) => norm.num_features(),
        }
    }
}
