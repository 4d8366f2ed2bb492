//! Calibrated stereo camera parameters.

use crate::common::*;

/// The `camera.json` file layout.
#[derive(Debug, Clone, Deserialize)]
struct CameraFile {
    left: ProjectionEntry,
    right: ProjectionEntry,
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectionEntry {
    #[serde(rename = "P")]
    projection: [[f64; 4]; 3],
}

/// The pinhole intrinsic matrix of one view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub matrix: [[f64; 3]; 3],
}

impl Intrinsics {
    pub fn fx(&self) -> f64 {
        self.matrix[0][0]
    }

    pub fn fy(&self) -> f64 {
        self.matrix[1][1]
    }

    pub fn cx(&self) -> f64 {
        self.matrix[0][2]
    }

    pub fn cy(&self) -> f64 {
        self.matrix[1][2]
    }

    /// Projects a point given in camera coordinates onto the image plane.
    ///
    /// Lens distortion and skew are ignored. Points on the `z = 0` plane are
    /// projected as if `z` were one.
    pub fn project(&self, [x, y, z]: [f64; 3]) -> [f64; 2] {
        let inv_z = if z != 0.0 { 1.0 / z } else { 1.0 };
        [
            self.fx() * x * inv_z + self.cx(),
            self.fy() * y * inv_z + self.cy(),
        ]
    }

    /// The intrinsics of the same view resampled by `sx` horizontally and `sy`
    /// vertically.
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        let [r1, r2, r3] = self.matrix;
        let scale_row = |row: [f64; 3], factor: f64| row.map(|val| val * factor);

        Self {
            matrix: [scale_row(r1, sx), scale_row(r2, sy), r3],
        }
    }

    /// The 3x3 matrix as a double tensor.
    pub fn to_tensor(&self) -> Tensor {
        Tensor::of_slice(&self.matrix.concat()).view([3, 3])
    }
}

/// The projection matrices of a rectified stereo rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoCamera {
    proj_l: [[f64; 4]; 3],
    proj_r: [[f64; 4]; 3],
}

impl StereoCamera {
    pub fn new(proj_l: [[f64; 4]; 3], proj_r: [[f64; 4]; 3]) -> Result<Self> {
        ensure!(
            proj_l.iter().chain(proj_r.iter()).flatten().all(|val| val.is_finite()),
            "projection matrices must be finite"
        );
        ensure!(
            proj_r[0][0] != 0.0,
            "the focal length of the right projection matrix must be non-zero"
        );
        Ok(Self { proj_l, proj_r })
    }

    /// Loads the `left.P` and `right.P` projection matrices from a camera file.
    pub fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read camera file '{}'", path.display()))?;
        let CameraFile { left, right } = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse camera file '{}'", path.display()))?;
        let camera = Self::new(left.projection, right.projection)
            .with_context(|| format!("invalid camera file '{}'", path.display()))?;
        Ok(camera)
    }

    pub fn proj_l(&self) -> &[[f64; 4]; 3] {
        &self.proj_l
    }

    pub fn proj_r(&self) -> &[[f64; 4]; 3] {
        &self.proj_r
    }

    /// The distance between the two camera centers, recovered from the
    /// horizontal translation term of the right projection matrix.
    pub fn baseline(&self) -> f64 {
        (self.proj_r[0][3] / self.proj_r[0][0]).abs()
    }

    pub fn intrinsics_l(&self) -> Intrinsics {
        intrinsics_of(&self.proj_l)
    }

    pub fn intrinsics_r(&self) -> Intrinsics {
        intrinsics_of(&self.proj_r)
    }
}

fn intrinsics_of(proj: &[[f64; 4]; 3]) -> Intrinsics {
    let row = |index: usize| -> [f64; 3] {
        let [a, b, c, _] = proj[index];
        [a, b, c]
    };
    Intrinsics {
        matrix: [row(0), row(1), row(2)],
    }
}
