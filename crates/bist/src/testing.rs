//! # Test Support Utilities

use burn::tensor::TensorData;
use num_traits::Float;

/// Assert that tensor data matches an expected slice element-wise.
///
/// # Arguments
///
/// - `actual`: the tensor data under test.
/// - `expected`: the expected values, in row-major order.
/// - `tolerance`: the max permitted absolute difference per element.
///
/// # Panics
///
/// If the lengths differ, or any element differs by more than `tolerance`.
pub fn assert_data_close<F>(
    actual: &TensorData,
    expected: &[F],
    tolerance: F,
) where
    F: Float + burn::tensor::Element + core::fmt::Display,
{
    let actual = actual
        .to_vec::<F>()
        .expect("tensor data should match the expected element type");

    assert_eq!(
        actual.len(),
        expected.len(),
        "element count mismatch: {} != {}",
        actual.len(),
        expected.len(),
    );

    for (index, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (*a - *e).abs() <= tolerance,
            "element {index}: {a} != {e} (tolerance {tolerance})",
        );
    }
}
