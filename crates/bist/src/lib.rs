#![warn(missing_docs)]
//!# bist - Burn Image Style Transfer
//!
//! The image transformation network from fast neural style transfer,
//! built on ``burn``.
//!
//! ## Notable Components
//!
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::conv`] - ``Conv2d + Norm (+ Relu)`` downsampling block.
//!   * [`layers::deconv`] - ``ConvTranspose2d + Norm + Relu`` upsampling block.
//!   * [`layers::norm`] - batch / instance normalization and the
//!     [`layers::norm::Normalization`] mode wrapper.
//! * [`models`] - complete model families.
//!   * [`models::transfer`] - the style transfer network.
//! * [`utility`] - kernel initialization and shape arithmetic.

/// Test-only helpers.
#[cfg(test)]
#[allow(dead_code)]
pub(crate) mod testing;

pub mod layers;

pub mod models;
pub mod utility;
