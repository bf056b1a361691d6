//! # Utility Modules

pub mod init;
pub mod shape;
