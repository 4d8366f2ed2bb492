//! The keypoint visibility probability hook.

use crate::common::*;

/// Estimates the per-keypoint visibility probability map of a sample from its
/// instance mask and 2D keypoints.
pub trait ProbEstimator
where
    Self: Send + Sync,
{
    fn compute(&self, mask: &Tensor, kpt_2d: &Tensor) -> Result<Tensor>;
}

impl<F> ProbEstimator for F
where
    F: Fn(&Tensor, &Tensor) -> Result<Tensor> + Send + Sync,
{
    fn compute(&self, mask: &Tensor, kpt_2d: &Tensor) -> Result<Tensor> {
        self(mask, kpt_2d)
    }
}
