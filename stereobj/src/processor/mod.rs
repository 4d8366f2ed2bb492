//! Data augmentation building blocks.

pub mod augmentation;

pub use augmentation::*;
