pub use anyhow::{bail, ensure, format_err, Result};
pub use approx::abs_diff_eq;
pub use serde::{Deserialize, Serialize};
pub use std::{
    fmt::{self, Display, Formatter},
    ops::Mul,
};
pub use tch::{vision, Device, IndexOp, Kind, Tensor};
