//! # Convolution Shape Arithmetic
//!
//! Helpers for "same"-padded convolution and transpose-convolution layers.
//!
//! # Reference
//!
//! - [conv_arithmetic diagram](https://github.com/vdumoulin/conv_arithmetic/blob/master/README.md)
//!   visual explanations of convolution shape parameters.

/// Symmetric padding preserving spatial size under a stride-1 convolution.
///
/// For strided convolutions over stride-divisible inputs, the same padding
/// yields ``out_size = in_size / stride``.
///
/// # Arguments
///
/// - `kernel_size`: the square kernel size; must be odd.
///
/// # Panics
///
/// If `kernel_size` is even; even kernels have no symmetric "same" padding.
pub fn same_padding(kernel_size: usize) -> usize {
    assert!(
        kernel_size % 2 == 1,
        "kernel size {kernel_size} has no symmetric \"same\" padding",
    );
    (kernel_size - 1) / 2
}

/// Padding pair for an exact `in_size * stride` transpose convolution.
///
/// ```text
/// out_size = (in_size - 1) * stride - 2 * padding + kernel_size + padding_out
/// ```
///
/// # Arguments
///
/// - `kernel_size`: the square kernel size; must be odd.
/// - `stride`: the transpose-convolution stride, must be > 0.
///
/// # Returns
///
/// ``(padding, padding_out)`` such that ``out_size == in_size * stride``.
///
/// # Panics
///
/// If `kernel_size` is even, or `stride` is zero.
pub fn transpose_same_padding(
    kernel_size: usize,
    stride: usize,
) -> (usize, usize) {
    assert!(stride > 0);
    let padding = same_padding(kernel_size);

    // With symmetric "same" padding, the output formula collapses to
    // (in - 1) * stride + 1 + padding_out; an exact multiple needs stride - 1.
    let padding_out = stride - 1;

    (padding, padding_out)
}

/// Get the output resolution of a stride-divided (downsampling) layer.
///
/// # Arguments
///
/// - `input_resolution`: ``[in_height=out_height*stride, in_width=out_width*stride]``.
///
/// # Returns
///
/// ``[out_height, out_width]``
///
/// # Panics
///
/// If the input resolution is not a multiple of the stride.
#[inline(always)]
pub fn stride_div_resolution(
    input_resolution: [usize; 2],
    stride: usize,
) -> [usize; 2] {
    let [height, width] = input_resolution;
    assert!(
        height % stride == 0 && width % stride == 0,
        "input resolution {height}x{width} is not a multiple of stride {stride}",
    );
    [height / stride, width / stride]
}

/// Get the output resolution of a stride-multiplied (upsampling) layer.
///
/// # Arguments
///
/// - `input_resolution`: ``[in_height, in_width]``.
///
/// # Returns
///
/// ``[in_height * stride, in_width * stride]``
#[inline(always)]
pub fn stride_mul_resolution(
    input_resolution: [usize; 2],
    stride: usize,
) -> [usize; 2] {
    let [height, width] = input_resolution;
    [height * stride, width * stride]
}
