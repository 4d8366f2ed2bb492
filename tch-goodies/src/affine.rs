//! Planar affine transforms on pixel coordinates.

use crate::common::*;

/// An affine map on homogeneous pixel coordinates `[x, y, 1]`.
///
/// Only the top two rows are stored. The bottom row is always `[0, 0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine2 {
    rows: [[f64; 3]; 2],
}

impl Affine2 {
    pub fn identity() -> Self {
        Self {
            rows: [
                [1.0, 0.0, 0.0], // row 1
                [0.0, 1.0, 0.0], // row 2
            ],
        }
    }

    pub fn from_rows(rows: [[f64; 3]; 2]) -> Self {
        Self { rows }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            rows: [
                [1.0, 0.0, tx], // row 1
                [0.0, 1.0, ty], // row 2
            ],
        }
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self {
            rows: [
                [sx, 0.0, 0.0], // row 1
                [0.0, sy, 0.0], // row 2
            ],
        }
    }

    /// Rotation by `degrees` around the pixel `(cx, cy)`.
    ///
    /// Positive angles rotate counter-clockwise on screen, where the y axis
    /// points downwards. This matches OpenCV's `getRotationMatrix2D` with unit
    /// scale.
    pub fn rotation_about(cx: f64, cy: f64, degrees: f64) -> Self {
        let radians = degrees.to_radians();
        let alpha = radians.cos();
        let beta = radians.sin();

        Self {
            rows: [
                [alpha, beta, (1.0 - alpha) * cx - beta * cy],
                [-beta, alpha, beta * cx + (1.0 - alpha) * cy],
            ],
        }
    }

    pub fn rows(&self) -> &[[f64; 3]; 2] {
        &self.rows
    }

    pub fn matrix(&self) -> [[f64; 3]; 3] {
        let [r1, r2] = self.rows;
        [r1, r2, [0.0, 0.0, 1.0]]
    }

    /// Returns the transform that applies `self` first and `next` afterwards.
    pub fn then(&self, next: &Affine2) -> Affine2 {
        next * self
    }

    pub fn inverse(&self) -> Option<Affine2> {
        let [[a, b, tx], [c, d, ty]] = self.rows;
        let det = a * d - b * c;
        if abs_diff_eq!(det, 0.0) {
            return None;
        }

        let ia = d / det;
        let ib = -b / det;
        let ic = -c / det;
        let id = a / det;

        Some(Self {
            rows: [
                [ia, ib, -(ia * tx + ib * ty)],
                [ic, id, -(ic * tx + id * ty)],
            ],
        })
    }

    /// Checks whether the linear part is the identity, i.e. the map is a pure
    /// translation.
    pub fn is_translation(&self) -> bool {
        let [[a, b, _], [c, d, _]] = self.rows;
        abs_diff_eq!(a, 1.0, epsilon = 1e-9)
            && abs_diff_eq!(b, 0.0, epsilon = 1e-9)
            && abs_diff_eq!(c, 0.0, epsilon = 1e-9)
            && abs_diff_eq!(d, 1.0, epsilon = 1e-9)
    }

    pub fn apply_point(&self, x: f64, y: f64) -> (f64, f64) {
        let [[a, b, tx], [c, d, ty]] = self.rows;
        (a * x + b * y + tx, c * x + d * y + ty)
    }

    /// The full 3x3 matrix as a tensor on CPU.
    pub fn to_tensor(&self, kind: Kind) -> Tensor {
        Tensor::of_slice(&self.matrix().concat())
            .view([3, 3])
            .to_kind(kind)
    }

    /// Transforms a `[N, 3]` tensor of homogeneous coordinates.
    pub fn f_apply_hcoords(&self, hcoords: &Tensor) -> Result<Tensor> {
        let (_, cols) = hcoords.size2()?;
        ensure!(
            cols == 3,
            "expect homogeneous coordinates of shape [N, 3], but get {:?}",
            hcoords.size()
        );
        let transform = self.to_tensor(hcoords.kind()).to_device(hcoords.device());
        let output = hcoords.f_matmul(&transform.transpose(0, 1))?;
        Ok(output)
    }

    /// The sampling matrix for `affine_grid_generator` that warps an image of
    /// the given size by this transform, with `align_corners = false`.
    ///
    /// The grid maps each output location to its source location, so the
    /// inverse transform expressed in normalized coordinates is returned.
    pub fn f_grid_theta(&self, height: i64, width: i64) -> Result<Tensor> {
        ensure!(height > 0 && width > 0, "image size must be positive");
        let inverse = self
            .inverse()
            .ok_or_else(|| format_err!("the affine transform is not invertible"))?;
        let height = height as f64;
        let width = width as f64;

        let to_normalized = Affine2::from_rows([
            [2.0 / width, 0.0, 1.0 / width - 1.0],
            [0.0, 2.0 / height, 1.0 / height - 1.0],
        ]);
        let from_normalized = Affine2::from_rows([
            [width / 2.0, 0.0, (width - 1.0) / 2.0],
            [0.0, height / 2.0, (height - 1.0) / 2.0],
        ]);
        let theta = from_normalized.then(&inverse).then(&to_normalized);

        Ok(Tensor::of_slice(&theta.rows.concat())
            .view([1, 2, 3])
            .to_kind(Kind::Float))
    }
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul<&Affine2> for &Affine2 {
    type Output = Affine2;

    fn mul(self, rhs: &Affine2) -> Self::Output {
        let lhs = self.matrix();
        let rhs = rhs.matrix();
        let entry = |row: usize, col: usize| -> f64 {
            (0..3).map(|k| lhs[row][k] * rhs[k][col]).sum()
        };

        Affine2 {
            rows: [
                [entry(0, 0), entry(0, 1), entry(0, 2)],
                [entry(1, 0), entry(1, 1), entry(1, 2)],
            ],
        }
    }
}

impl Mul<Affine2> for Affine2 {
    type Output = Affine2;

    fn mul(self, rhs: Affine2) -> Self::Output {
        &self * &rhs
    }
}

impl Display for Affine2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let [[a, b, tx], [c, d, ty]] = self.rows;
        write!(f, "[[{}, {}, {}], [{}, {}, {}]]", a, b, tx, c, d, ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rotation_keeps_center_fixed() {
        let rotation = Affine2::rotation_about(12.0, -3.5, 37.0);
        let (x, y) = rotation.apply_point(12.0, -3.5);
        assert_abs_diff_eq!(x, 12.0, epsilon = 1e-9);
        assert_abs_diff_eq!(y, -3.5, epsilon = 1e-9);
        assert!(!rotation.is_translation());
    }

    #[test]
    fn rotation_direction() {
        // a point to the right of the center moves upwards on screen
        let rotation = Affine2::rotation_about(0.0, 0.0, 90.0);
        let (x, y) = rotation.apply_point(1.0, 0.0);
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(y, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn composition_order() {
        let shift = Affine2::translation(2.0, 3.0);
        let scale = Affine2::scaling(0.5, 4.0);

        let (x, y) = shift.then(&scale).apply_point(1.0, 1.0);
        assert_abs_diff_eq!(x, 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(y, 16.0, epsilon = 1e-9);

        let (x, y) = scale.then(&shift).apply_point(1.0, 1.0);
        assert_abs_diff_eq!(x, 2.5, epsilon = 1e-9);
        assert_abs_diff_eq!(y, 7.0, epsilon = 1e-9);
    }

    #[test]
    fn inverse_round_trip() {
        let transform = Affine2::rotation_about(4.0, 5.0, -20.0)
            .then(&Affine2::scaling(1.3, 0.7))
            .then(&Affine2::translation(-8.0, 2.5));
        let inverse = transform.inverse().unwrap();
        assert!(transform.then(&inverse).is_translation());

        let (tx, ty) = transform.apply_point(3.0, 9.0);
        let (x, y) = inverse.apply_point(tx, ty);
        assert_abs_diff_eq!(x, 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(y, 9.0, epsilon = 1e-9);

        assert!(Affine2::scaling(0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn hcoords_transform() -> Result<()> {
        let transform = Affine2::translation(1.0, -2.0).then(&Affine2::scaling(2.0, 2.0));
        let hcoords = Tensor::of_slice(&[0.0f64, 0.0, 1.0, 3.0, 4.0, 1.0]).view([2, 3]);
        let output = transform.f_apply_hcoords(&hcoords)?;
        let values: Vec<f64> = output.view([-1]).into();
        assert_eq!(values, vec![2.0, -4.0, 1.0, 8.0, 4.0, 1.0]);
        Ok(())
    }

    #[test]
    fn identity_grid_theta() -> Result<()> {
        let theta = Affine2::identity().f_grid_theta(7, 11)?;
        let values: Vec<f32> = theta.view([-1]).into();
        let expect = [1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0];
        values
            .iter()
            .zip(expect.iter())
            .for_each(|(&value, &expect)| assert_abs_diff_eq!(value, expect, epsilon = 1e-6));
        Ok(())
    }
}
