//! # Neural Network Layers

pub mod conv;
pub mod deconv;
pub mod norm;
