//! Tensor helpers shared by the stereo pose dataset crates.

mod common;
pub mod affine;
pub mod tensor;

pub use affine::*;
pub use tensor::*;
