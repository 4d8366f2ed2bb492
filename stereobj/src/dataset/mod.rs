//! Dataset abstractions and the stereo object pose dataset.

mod dataset_;
mod stereobj;

pub use dataset_::*;
pub use self::stereobj::*;
