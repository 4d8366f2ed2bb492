//! Data loading and augmentation for stereo 6-DoF object pose estimation.

mod common;
pub mod camera;
pub mod config;
pub mod dataset;
pub mod error;
pub mod keypoint;
pub mod label;
pub mod mask;
pub mod processor;
pub mod profiling;
pub mod prob;
pub mod record;
pub mod split;
pub mod transform;

pub use camera::*;
pub use config::*;
pub use dataset::*;
pub use error::*;
pub use keypoint::*;
pub use label::*;
pub use mask::*;
pub use prob::*;
pub use record::*;
pub use split::*;
pub use transform::*;
