//! Errors a caller may want to tell apart from plain I/O failures.

use std::path::PathBuf;
use thiserror::Error;

/// Dataset level failures that indicate a corrupt dataset or a caller bug.
///
/// They are carried inside [`anyhow::Error`] and can be recovered with
/// `downcast_ref::<DatasetError>()`.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("no object of class '{cls_type}' is labeled in '{}'", path.display())]
    MissingClass { path: PathBuf, cls_type: String },
    #[error("index {index} is out of range for a dataset of {len} samples")]
    IndexOutOfRange { index: usize, len: usize },
    #[error(
        "'{}' holds {count} values, expect a positive multiple of 3",
        path.display()
    )]
    InvalidKeypointFile { path: PathBuf, count: usize },
    #[error("no mask of object '{object}' in view '{view}' is stored in '{}'", path.display())]
    MissingMask {
        path: PathBuf,
        view: String,
        object: String,
    },
}
