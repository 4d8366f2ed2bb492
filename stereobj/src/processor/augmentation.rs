use crate::{common::*, config::AugmentationConfig};

/// The options of [`Augmentation`].
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentationInit {
    /// The range of rotation angles in degrees.
    pub rotate_degrees: (R64, R64),
    /// The range of the crop window size relative to the output size.
    pub resize_ratio: (R64, R64),
    /// The fraction of the object extent the crop window is placed around.
    pub overlap_ratio: R64,
}

impl AugmentationInit {
    pub fn build(self) -> Result<Augmentation> {
        let Self {
            rotate_degrees: (min_degrees, max_degrees),
            resize_ratio: (min_ratio, max_ratio),
            overlap_ratio,
        } = self;

        ensure!(
            min_degrees <= max_degrees,
            "the minimum rotation angle must not exceed the maximum"
        );
        ensure!(min_ratio > 0.0, "the minimum resize ratio must be positive");
        ensure!(
            min_ratio <= max_ratio,
            "the minimum resize ratio must not exceed the maximum"
        );
        ensure!(overlap_ratio >= 0.0, "overlap_ratio must be non-negative");

        Ok(Augmentation {
            rotate_degrees: (min_degrees.raw(), max_degrees.raw()),
            resize_ratio: (min_ratio.raw(), max_ratio.raw()),
            overlap_ratio: overlap_ratio.raw(),
        })
    }
}

impl Default for AugmentationInit {
    fn default() -> Self {
        AugmentationConfig::default().into()
    }
}

impl From<&AugmentationConfig> for AugmentationInit {
    fn from(config: &AugmentationConfig) -> Self {
        let AugmentationConfig {
            rotate_degrees,
            resize_ratio,
            overlap_ratio,
        } = *config;

        Self {
            rotate_degrees,
            resize_ratio,
            overlap_ratio,
        }
    }
}

impl From<AugmentationConfig> for AugmentationInit {
    fn from(config: AugmentationConfig) -> Self {
        (&config).into()
    }
}

/// The augmented image, mask and keypoints.
#[derive(Debug, TensorLike)]
pub struct AugmentOutput {
    /// The `[channels, height, width]` image.
    pub image: Tensor,
    /// The `[height, width]` mask.
    pub mask: Tensor,
    /// The `[K, 2]` keypoints.
    pub kpt_2d: Tensor,
    /// The map from input pixel coordinates to output pixel coordinates.
    #[tensor_like(clone)]
    pub affine: Affine2,
}

/// Geometric augmentation that keeps the labeled instance in view.
#[derive(Debug, Clone)]
pub struct Augmentation {
    rotate_degrees: (f64, f64),
    resize_ratio: (f64, f64),
    overlap_ratio: f64,
}

impl Augmentation {
    /// Augments an image together with its instance mask and keypoints, and
    /// produces outputs of size `height` by `width`.
    ///
    /// If the mask has foreground, the instance is rotated around its centroid
    /// and a randomly sized window containing it is cropped and resized to the
    /// output size. Otherwise the image is cropped or padded around its center.
    pub fn augment(
        &self,
        image: &Tensor,
        mask: &Tensor,
        kpt_2d: &Tensor,
        height: i64,
        width: i64,
        rng: &mut StdRng,
    ) -> Result<AugmentOutput> {
        ensure!(height > 0 && width > 0, "the output size must be positive");
        let (_, image_h, image_w) = image.size3()?;
        let mask_shape = mask.size2()?;
        ensure!(
            mask_shape == (image_h, image_w),
            "the mask shape {:?} does not match the image size {:?}",
            mask_shape,
            (image_h, image_w)
        );
        let (_, kpt_cols) = kpt_2d.size2()?;
        ensure!(
            kpt_cols == 2,
            "expect keypoints of shape [K, 2], but get {:?}",
            kpt_2d.size()
        );

        tch::no_grad(|| -> Result<_> {
            let (image, mask, affine) = match Foreground::of(mask)? {
                Some(foreground) => {
                    let (image, mask, rotation) =
                        self.rotate_instance(image, mask, &foreground, rng)?;
                    let (image, mask, crop) =
                        self.crop_resize_instance(&image, &mask, height, width, rng)?;
                    (image, mask, rotation.then(&crop))
                }
                None => {
                    debug!("no foreground in the mask, skip instance augmentation");
                    crop_or_pad(image, mask, height, width)?
                }
            };

            let hcoords = Tensor::cat(
                &[
                    kpt_2d.to_kind(Kind::Double),
                    Tensor::ones(&[kpt_2d.size()[0], 1], (Kind::Double, kpt_2d.device())),
                ],
                1,
            );
            let kpt_2d = affine
                .f_apply_hcoords(&hcoords)?
                .narrow(1, 0, 2)
                .to_kind(kpt_2d.kind());

            Ok(AugmentOutput {
                image,
                mask,
                kpt_2d,
                affine,
            })
        })
    }

    /// Rotates the image and the mask around the centroid of the foreground.
    fn rotate_instance(
        &self,
        image: &Tensor,
        mask: &Tensor,
        foreground: &Foreground,
        rng: &mut StdRng,
    ) -> Result<(Tensor, Tensor, Affine2)> {
        let (min_degrees, max_degrees) = self.rotate_degrees;
        let degrees = rng.gen_range(min_degrees..=max_degrees);
        let (cx, cy) = foreground.centroid;
        let rotation = Affine2::rotation_about(cx, cy, degrees);

        let image = image.f_warp_affine2d(&rotation, Interpolation::Bilinear)?;
        let mask = mask.f_warp_affine2d(&rotation, Interpolation::Nearest)?;

        Ok((image, mask, rotation))
    }

    /// Crops a window of random size around the foreground and resizes it to
    /// the output size.
    fn crop_resize_instance(
        &self,
        image: &Tensor,
        mask: &Tensor,
        height: i64,
        width: i64,
        rng: &mut StdRng,
    ) -> Result<(Tensor, Tensor, Affine2)> {
        let (_, image_h, image_w) = image.size3()?;
        let (min_ratio, max_ratio) = self.resize_ratio;
        let ratio = rng.gen_range(min_ratio..=max_ratio);
        let window_h = ((height as f64 * ratio) as i64).max(1);
        let window_w = ((width as f64 * ratio) as i64).max(1);

        // the rotation may push the instance out of the image
        let foreground = Foreground::of(mask)?;
        let extent_y = foreground.as_ref().map(|fg| fg.rows);
        let extent_x = foreground.as_ref().map(|fg| fg.cols);

        let top = self.window_offset(image_h, window_h, extent_y, rng);
        let left = self.window_offset(image_w, window_w, extent_x, rng);

        let image = image
            .f_crop_or_pad2d(top, left, window_h, window_w)?
            .f_resize2d_exact(height, width)?;
        let mask = mask
            .f_crop_or_pad2d(top, left, window_h, window_w)?
            .f_resize_nearest2d(height, width)?;

        let transform = Affine2::translation(-left as f64, -top as f64).then(&Affine2::scaling(
            width as f64 / window_w as f64,
            height as f64 / window_h as f64,
        ));

        Ok((image, mask, transform))
    }

    /// The window start along one axis.
    ///
    /// A window larger than the image is centered on it. Otherwise the start
    /// is drawn so that the window reaches at least `overlap_ratio` into the
    /// foreground extent while staying inside the image.
    fn window_offset(
        &self,
        size: i64,
        window: i64,
        extent: Option<(i64, i64)>,
        rng: &mut StdRng,
    ) -> i64 {
        if window >= size {
            return -((window - size) / 2);
        }

        let (lower, upper) = match extent {
            Some((min, max)) => {
                let anchor = min as f64 + self.overlap_ratio * (max - min) as f64;
                let upper = anchor.min((size - window) as f64) as i64;
                let lower = (anchor - window as f64).max(0.0) as i64;
                (lower, upper)
            }
            None => (0, 0),
        };

        if lower < upper {
            rng.gen_range(lower..upper)
        } else {
            0
        }
    }
}

/// Crops or pads the image and the mask around their centers to the output size.
pub fn crop_or_pad(
    image: &Tensor,
    mask: &Tensor,
    height: i64,
    width: i64,
) -> Result<(Tensor, Tensor, Affine2)> {
    let (_, image_h, image_w) = image.size3()?;
    let center_offset = |size: i64, window: i64| -> i64 {
        if window >= size {
            -((window - size) / 2)
        } else {
            (size - window) / 2
        }
    };
    let top = center_offset(image_h, height);
    let left = center_offset(image_w, width);

    let image = image.f_crop_or_pad2d(top, left, height, width)?;
    let mask = mask.f_crop_or_pad2d(top, left, height, width)?;

    Ok((
        image,
        mask,
        Affine2::translation(-left as f64, -top as f64),
    ))
}

/// Statistics of the nonzero pixels of a mask.
#[derive(Debug, Clone, PartialEq)]
struct Foreground {
    /// The mean `(x, y)` location.
    centroid: (f64, f64),
    /// The inclusive `(min, max)` row range.
    rows: (i64, i64),
    /// The inclusive `(min, max)` column range.
    cols: (i64, i64),
}

impl Foreground {
    fn of(mask: &Tensor) -> Result<Option<Self>> {
        let coords: Vec<i64> = mask.f_ne(0i64)?.f_nonzero()?.f_view([-1])?.into();
        if coords.is_empty() {
            return Ok(None);
        }

        let (ys, xs): (Vec<i64>, Vec<i64>) = coords
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .unzip();
        let count = ys.len() as f64;
        let mean = |values: &[i64]| values.iter().map(|&val| val as f64).sum::<f64>() / count;
        let range = |values: &[i64]| -> (i64, i64) {
            values
                .iter()
                .fold((i64::MAX, i64::MIN), |(min, max), &val| {
                    (min.min(val), max.max(val))
                })
        };

        Ok(Some(Self {
            centroid: (mean(&xs), mean(&ys)),
            rows: range(&ys),
            cols: range(&xs),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(height: i64, width: i64, top: i64, left: i64, side: i64) -> (Tensor, Tensor) {
        let image = Tensor::zeros(&[3, height, width], (Kind::Uint8, Device::Cpu));
        let _ = image
            .narrow(1, top, side)
            .narrow(2, left, side)
            .fill_(200i64);
        let mask = Tensor::zeros(&[height, width], (Kind::Uint8, Device::Cpu));
        let _ = mask.narrow(0, top, side).narrow(1, left, side).fill_(1i64);
        (image, mask)
    }

    fn keypoints() -> Tensor {
        Tensor::of_slice(&[10.0f32, 12.0, 20.0, 18.0, 15.0, 15.0]).view([3, 2])
    }

    #[test]
    fn reject_invalid_options() {
        let init = AugmentationInit {
            resize_ratio: (r64(1.2), r64(0.8)),
            ..Default::default()
        };
        assert!(init.build().is_err());

        let init = AugmentationInit {
            rotate_degrees: (r64(10.0), r64(-10.0)),
            ..Default::default()
        };
        assert!(init.build().is_err());

        assert!(AugmentationInit::default().build().is_ok());
    }

    #[test]
    fn augment_foreground_instance() -> Result<()> {
        let augmentation = AugmentationInit::default().build()?;
        let (image, mask) = instance(32, 40, 8, 10, 12);
        let kpt_2d = keypoints();
        let mut rng = StdRng::seed_from_u64(7);

        let output = augmentation.augment(&image, &mask, &kpt_2d, 24, 30, &mut rng)?;
        assert_eq!(output.image.size(), [3, 24, 30]);
        assert_eq!(output.image.kind(), Kind::Uint8);
        assert_eq!(output.mask.size(), [24, 30]);
        assert_eq!(output.mask.kind(), Kind::Uint8);
        assert_eq!(output.kpt_2d.size(), [3, 2]);

        let input: Vec<f32> = kpt_2d.view([-1]).into();
        let actual: Vec<f32> = output.kpt_2d.view([-1]).into();
        input
            .chunks_exact(2)
            .zip(actual.chunks_exact(2))
            .for_each(|(point, actual)| {
                let (x, y) = output.affine.apply_point(point[0] as f64, point[1] as f64);
                assert_abs_diff_eq!(actual[0] as f64, x, epsilon = 1e-3);
                assert_abs_diff_eq!(actual[1] as f64, y, epsilon = 1e-3);
            });
        Ok(())
    }

    #[test]
    fn fixed_angle_keeps_instance() -> Result<()> {
        let augmentation = AugmentationInit {
            rotate_degrees: (r64(0.0), r64(0.0)),
            resize_ratio: (r64(1.0), r64(1.0)),
            overlap_ratio: r64(1.0),
        }
        .build()?;
        let (image, mask) = instance(32, 32, 8, 8, 10);
        let mut rng = StdRng::seed_from_u64(1);

        let output = augmentation.augment(&image, &mask, &keypoints(), 32, 32, &mut rng)?;
        assert!(output.affine.is_translation());
        assert_eq!(i64::from(output.mask.sum(Kind::Int64)), 100);
        Ok(())
    }

    #[test]
    fn background_is_cropped_at_center() -> Result<()> {
        let augmentation = AugmentationInit::default().build()?;
        let image = Tensor::ones(&[3, 20, 30], (Kind::Uint8, Device::Cpu));
        let mask = Tensor::zeros(&[20, 30], (Kind::Uint8, Device::Cpu));
        let kpt_2d = keypoints();
        let mut rng = StdRng::seed_from_u64(3);

        let output = augmentation.augment(&image, &mask, &kpt_2d, 10, 40, &mut rng)?;
        assert_eq!(output.image.size(), [3, 10, 40]);
        assert_eq!(output.mask.size(), [10, 40]);
        assert!(output.affine.is_translation());
        assert_eq!(output.affine.apply_point(0.0, 0.0), (5.0, -5.0));

        // the padded columns are zero
        assert_eq!(output.image.int64_value(&[0, 0, 0]), 0);
        assert_eq!(output.image.int64_value(&[0, 0, 5]), 1);
        assert_eq!(output.image.int64_value(&[0, 9, 34]), 1);
        assert_eq!(output.image.int64_value(&[0, 9, 35]), 0);

        let first: Vec<f32> = output.kpt_2d.i(0i64).into();
        assert_abs_diff_eq!(first[0], 15.0);
        assert_abs_diff_eq!(first[1], 7.0);
        Ok(())
    }

    #[test]
    fn same_seed_same_output() -> Result<()> {
        let augmentation = AugmentationInit::default().build()?;
        let (image, mask) = instance(32, 32, 4, 6, 14);

        let run = |seed: u64| -> Result<AugmentOutput> {
            let mut rng = StdRng::seed_from_u64(seed);
            augmentation.augment(&image, &mask, &keypoints(), 32, 32, &mut rng)
        };
        let lhs = run(11)?;
        let rhs = run(11)?;
        assert!(lhs.image.equal(&rhs.image));
        assert!(lhs.mask.equal(&rhs.mask));
        assert_eq!(lhs.affine, rhs.affine);
        Ok(())
    }

    #[test]
    fn foreground_statistics() -> Result<()> {
        let (_, mask) = instance(16, 16, 2, 4, 3);
        let foreground = Foreground::of(&mask)?.unwrap();
        assert_eq!(foreground.rows, (2, 4));
        assert_eq!(foreground.cols, (4, 6));
        assert_abs_diff_eq!(foreground.centroid.0, 5.0);
        assert_abs_diff_eq!(foreground.centroid.1, 3.0);

        let empty = Tensor::zeros(&[4, 4], (Kind::Bool, Device::Cpu));
        assert!(Foreground::of(&empty)?.is_none());
        Ok(())
    }
}
