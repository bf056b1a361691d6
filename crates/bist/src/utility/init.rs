//! # Kernel Initialization
//!
//! Gaussian weight initialization for the style transfer convolution layers.
//!
//! Every initializer takes an explicit `Option<u64>` seed; `Some` draws from a
//! deterministic generator, `None` draws from OS entropy. The caller owns the
//! determinism policy for the whole model.

use burn::prelude::{Backend, Tensor};
use burn::tensor::TensorData;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// Standard deviation of every kernel initialization in the model.
pub const WEIGHTS_INIT_STDDEV: f64 = 0.1;

/// Truncation bound, in standard deviations from the mean.
const TRUNCATION_STDDEVS: f64 = 2.0;

fn kernel_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn kernel_from_samples<B: Backend, F>(
    shape: [usize; 4],
    device: &B::Device,
    mut sample: F,
) -> Tensor<B, 4>
where
    F: FnMut() -> f64,
{
    let count = shape.iter().product();
    let values: Vec<f32> = (0..count).map(|_| sample() as f32).collect();
    Tensor::from_data(TensorData::new(values, shape), device)
}

/// Draw a kernel tensor from a zero-mean normal distribution.
///
/// # Arguments
///
/// - `shape`: the kernel shape; ``[out_channels, in_channels, k_h, k_w]``
///   for a direct convolution (the `Conv2d` weight layout).
/// - `std`: the standard deviation of the draw.
/// - `seed`: `Some` for a deterministic draw, `None` for OS entropy.
/// - `device`: the device to create the tensor on.
///
/// # Returns
///
/// A kernel tensor of the requested shape.
pub fn normal_kernel<B: Backend>(
    shape: [usize; 4],
    std: f64,
    seed: Option<u64>,
    device: &B::Device,
) -> Tensor<B, 4> {
    let mut rng = kernel_rng(seed);
    let normal = Normal::new(0.0, std).expect("stddev must be finite and positive");

    kernel_from_samples(shape, device, || normal.sample(&mut rng))
}

/// Draw a kernel tensor from a truncated zero-mean normal distribution.
///
/// Draws farther than 2 standard deviations from the mean are redrawn.
///
/// # Arguments
///
/// - `shape`: the kernel shape; ``[in_channels, out_channels, k_h, k_w]``
///   for a transpose convolution (the `ConvTranspose2d` weight layout, with
///   the channel axes swapped relative to `Conv2d`).
/// - `std`: the standard deviation of the underlying draw.
/// - `seed`: `Some` for a deterministic draw, `None` for OS entropy.
/// - `device`: the device to create the tensor on.
///
/// # Returns
///
/// A kernel tensor of the requested shape, with every value in
/// ``[-2 * std, 2 * std]``.
pub fn truncated_normal_kernel<B: Backend>(
    shape: [usize; 4],
    std: f64,
    seed: Option<u64>,
    device: &B::Device,
) -> Tensor<B, 4> {
    let mut rng = kernel_rng(seed);
    let normal = Normal::new(0.0, std).expect("stddev must be finite and positive");
    let bound = TRUNCATION_STDDEVS * std;

    kernel_from_samples(shape, device, || {
        loop {
            let value = normal.sample(&mut rng);
            if value.abs() <= bound {
                break value;
            }
        }
    })
}
