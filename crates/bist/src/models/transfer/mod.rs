//! # Fast Style Transfer

pub mod residual_block;
pub mod transformer;
