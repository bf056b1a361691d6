//! # Model Families

pub mod transfer;
