use crate::{common::*, record::PoseSample};

/// The generic dataset trait.
pub trait GenericDataset
where
    Self: Debug + Send + Sync,
{
    /// The object class the samples are labeled for.
    fn cls_type(&self) -> &str;

    /// The number of keypoints of each sample.
    fn num_keypoints(&self) -> usize;

    /// Whether samples contain both stereo views.
    fn is_stereo(&self) -> bool;
}

/// The dataset that can be random accessed.
pub trait RandomAccessDataset
where
    Self: GenericDataset,
{
    /// Get number of records in the dataset.
    fn num_records(&self) -> usize;

    /// Get the nth record in the dataset.
    fn nth(&self, index: usize) -> Result<PoseSample>;
}
