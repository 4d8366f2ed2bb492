pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use approx::{abs_diff_eq, assert_abs_diff_eq};
pub use derivative::Derivative;
pub use getset::Getters;
pub use indexmap::IndexMap;
pub use itertools::{izip, Itertools as _};
pub use log::{debug, info, warn};
pub use noisy_float::prelude::*;
pub use rand::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    collections::HashSet,
    fmt::{self, Debug},
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
pub use tch::{vision, Device, IndexOp, Kind, Tensor};
pub use tch_goodies::{Affine2, Interpolation, TensorExt as _};
pub use tch_tensor_like::TensorLike;

pub type Fallible<T> = Result<T, Error>;
