//! The per-view sample transform hook.

use crate::{
    common::*,
    processor::{Augmentation, AugmentationInit},
};

/// A view passed through a [`SampleTransform`].
#[derive(Debug, TensorLike)]
pub struct TransformView {
    /// The `[3, height, width]` uint8 image.
    pub image: Tensor,
    /// The `[K, 2]` float keypoints in pixel coordinates.
    pub kpt_2d: Tensor,
    /// The `[height, width]` uint8 instance mask.
    pub mask: Tensor,
    /// The 3x3 double intrinsic matrix in the pixel frame of `image`.
    pub k: Tensor,
}

/// Transforms a view of an annotated sample.
///
/// The transform returns the intrinsic matrix that is consistent with the
/// transformed image.
pub trait SampleTransform
where
    Self: Send + Sync,
{
    fn forward(&self, view: TransformView, rng: &mut StdRng) -> Result<TransformView>;
}

impl<F> SampleTransform for F
where
    F: Fn(TransformView, &mut StdRng) -> Result<TransformView> + Send + Sync,
{
    fn forward(&self, view: TransformView, rng: &mut StdRng) -> Result<TransformView> {
        self(view, rng)
    }
}

/// Applies [`Augmentation`] to a view and keeps the image size.
#[derive(Debug, Clone)]
pub struct AugmentTransform {
    augmentation: Augmentation,
}

impl AugmentTransform {
    pub fn new(init: AugmentationInit) -> Result<Self> {
        Ok(Self {
            augmentation: init.build()?,
        })
    }
}

impl From<Augmentation> for AugmentTransform {
    fn from(augmentation: Augmentation) -> Self {
        Self { augmentation }
    }
}

impl SampleTransform for AugmentTransform {
    fn forward(&self, view: TransformView, rng: &mut StdRng) -> Result<TransformView> {
        let TransformView {
            image,
            kpt_2d,
            mask,
            k,
        } = view;
        let (_, height, width) = image.size3()?;

        let output = self
            .augmentation
            .augment(&image, &mask, &kpt_2d, height, width, rng)?;

        // the affine map acts on pixel coordinates, so it left-multiplies K
        let affine = output.affine.to_tensor(Kind::Double).to_device(k.device());
        let k = affine.f_matmul(&k.to_kind(Kind::Double))?;

        Ok(TransformView {
            image: output.image,
            kpt_2d: output.kpt_2d,
            mask: output.mask,
            k,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> TransformView {
        let image = Tensor::zeros(&[3, 16, 16], (Kind::Uint8, Device::Cpu));
        let mask = Tensor::zeros(&[16, 16], (Kind::Uint8, Device::Cpu));
        let _ = mask.narrow(0, 4, 6).narrow(1, 5, 6).fill_(1i64);
        let kpt_2d = Tensor::of_slice(&[6.0f32, 6.0, 9.0, 8.0]).view([2, 2]);
        let k = Tensor::of_slice(&[50.0, 0.0, 8.0, 0.0, 50.0, 8.0, 0.0, 0.0, 1.0]).view([3, 3]);

        TransformView {
            image,
            kpt_2d,
            mask,
            k,
        }
    }

    #[test]
    fn closure_transform() -> Result<()> {
        let flip = |view: TransformView, _rng: &mut StdRng| -> Result<TransformView> {
            Ok(TransformView {
                image: view.image.flip(&[2]),
                ..view
            })
        };
        let mut rng = StdRng::seed_from_u64(0);
        let output = flip.forward(view(), &mut rng)?;
        assert_eq!(output.image.size(), [3, 16, 16]);
        Ok(())
    }

    #[test]
    fn augment_updates_intrinsics() -> Result<()> {
        let transform = AugmentTransform::new(AugmentationInit::default())?;
        let mut rng = StdRng::seed_from_u64(5);
        let output = transform.forward(view(), &mut rng)?;

        assert_eq!(output.image.size(), [3, 16, 16]);
        assert_eq!(output.mask.size(), [16, 16]);
        assert_eq!(output.kpt_2d.size(), [2, 2]);
        assert_eq!(output.k.size(), [3, 3]);

        // the bottom row of K is untouched by planar affine maps
        let values: Vec<f64> = output.k.view([-1]).into();
        assert_abs_diff_eq!(values[6], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(values[7], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(values[8], 1.0, epsilon = 1e-9);
        Ok(())
    }
}
