//! Object keypoint templates and their projection into images.

use crate::{camera::Intrinsics, common::*, error::DatasetError};

/// The fixed 3D keypoints of an object class in the object frame.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointTemplate {
    points: Vec<[f64; 3]>,
}

impl KeypointTemplate {
    pub fn new(points: Vec<[f64; 3]>) -> Result<Self> {
        ensure!(!points.is_empty(), "keypoint template must not be empty");
        Ok(Self { points })
    }

    /// Loads a `.kp` file of whitespace-separated floats, three per point.
    pub fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read keypoint file '{}'", path.display()))?;
        let values: Vec<f64> = text
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().with_context(|| {
                    format!(
                        "invalid number '{}' in keypoint file '{}'",
                        token,
                        path.display()
                    )
                })
            })
            .try_collect()?;

        if values.is_empty() || values.len() % 3 != 0 {
            return Err(DatasetError::InvalidKeypointFile {
                path: path.to_owned(),
                count: values.len(),
            }
            .into());
        }

        let points: Vec<_> = values
            .chunks_exact(3)
            .map(|chunk| [chunk[0], chunk[1], chunk[2]])
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// The leading `min(num_kp, len)` points.
    pub fn truncated(&self, num_kp: usize) -> &[[f64; 3]] {
        &self.points[..num_kp.min(self.points.len())]
    }

    /// The leading `min(num_kp, len)` points as a `[K, 3]` double tensor.
    pub fn to_tensor(&self, num_kp: usize) -> Tensor {
        let points = self.truncated(num_kp);
        Tensor::of_slice(&points.concat()).view([points.len() as i64, 3])
    }
}

/// Maps object-frame points into camera space with `x_c = R x + t`.
pub fn transform_points(
    points: &[[f64; 3]],
    rotation: &[[f64; 3]; 3],
    translation: &[f64; 3],
) -> Vec<[f64; 3]> {
    points
        .iter()
        .map(|point| {
            let mut output = [0.0; 3];
            izip!(output.iter_mut(), rotation, translation).for_each(|(out, row, offset)| {
                *out = izip!(row, point).map(|(lhs, rhs)| lhs * rhs).sum::<f64>() + offset;
            });
            output
        })
        .collect()
}

/// Projects template points posed by `(rotation, translation)` into an image.
///
/// The pixel coordinates are computed at the native sensor resolution and
/// rescaled by `scale = (sx, sy)` to the output resolution.
pub fn project_keypoints(
    points: &[[f64; 3]],
    rotation: &[[f64; 3]; 3],
    translation: &[f64; 3],
    intrinsics: &Intrinsics,
    (sx, sy): (f64, f64),
) -> Vec<[f64; 2]> {
    transform_points(points, rotation, translation)
        .into_iter()
        .map(|point| {
            let [u, v] = intrinsics.project(point);
            [u * sx, v * sy]
        })
        .collect()
}

/// Packs 2D keypoints into a `[K, 2]` float tensor.
pub fn keypoints_to_tensor(keypoints: &[[f64; 2]]) -> Tensor {
    Tensor::of_slice(&keypoints.concat())
        .view([keypoints.len() as i64, 2])
        .to_kind(Kind::Float)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_template() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hammer.kp");
        fs::write(&path, "0.0 0.1 0.2\n1.0 1.1 1.2\n 2.0\t2.1 2.2 \n")?;

        let template = KeypointTemplate::load(&path)?;
        assert_eq!(template.len(), 3);
        assert_eq!(template.points()[1], [1.0, 1.1, 1.2]);
        assert_eq!(template.truncated(2).len(), 2);
        assert_eq!(template.truncated(20).len(), 3);
        assert_eq!(template.to_tensor(20).size(), [3, 3]);
        assert_eq!(template.to_tensor(1).size(), [1, 3]);
        Ok(())
    }

    #[test]
    fn reject_malformed_template() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.kp");

        fs::write(&path, "0.0 0.1 0.2 1.0")?;
        let err = KeypointTemplate::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::InvalidKeypointFile { count: 4, .. })
        ));

        fs::write(&path, "")?;
        assert!(KeypointTemplate::load(&path).is_err());

        fs::write(&path, "0.0 abc 0.2")?;
        assert!(KeypointTemplate::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn project_with_identity_pose() {
        let intrinsics = Intrinsics {
            matrix: [[100.0, 0.0, 50.0], [0.0, 200.0, 60.0], [0.0, 0.0, 1.0]],
        };
        let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let points = [[0.0, 0.0, 0.0], [0.5, -0.25, 1.0]];

        let projected = project_keypoints(
            &points,
            &rotation,
            &[0.0, 0.0, 1.0],
            &intrinsics,
            (0.5, 2.0),
        );
        assert_abs_diff_eq!(projected[0][0], 25.0);
        assert_abs_diff_eq!(projected[0][1], 120.0);
        assert_abs_diff_eq!(projected[1][0], (100.0 * 0.25 + 50.0) * 0.5);
        assert_abs_diff_eq!(projected[1][1], (200.0 * -0.125 + 60.0) * 2.0);
    }

    #[test]
    fn rotate_points() {
        // 90 degrees around the z axis
        let rotation = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let output = transform_points(&[[1.0, 2.0, 3.0]], &rotation, &[0.0, 0.0, 10.0]);
        assert_eq!(output, vec![[-2.0, 1.0, 13.0]]);
    }
}
