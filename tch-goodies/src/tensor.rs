use crate::{affine::Affine2, common::*};

/// Interpolation modes accepted by [`TensorExt::f_warp_affine2d`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interpolation {
    Bilinear,
    Nearest,
}

impl Interpolation {
    // See https://github.com/pytorch/pytorch/blob/f597ac6efc70431e66d945c16fa12b767989b032/aten/src/ATen/native/GridSampler.h#L10-L11
    fn grid_sampler_mode(&self) -> i64 {
        match self {
            Self::Bilinear => 0,
            Self::Nearest => 1,
        }
    }
}

pub trait TensorExt {
    fn is_empty(&self) -> bool;

    fn f_fill_rect_(
        &mut self,
        top: i64,
        left: i64,
        bottom: i64,
        right: i64,
        color: &Tensor,
    ) -> Result<Tensor>;

    fn fill_rect_(
        &mut self,
        top: i64,
        left: i64,
        bottom: i64,
        right: i64,
        color: &Tensor,
    ) -> Tensor {
        self.f_fill_rect_(top, left, bottom, right, color).unwrap()
    }

    /// Resizes a `[channels, height, width]` image with the image crate filter.
    fn f_resize2d_exact(&self, new_height: i64, new_width: i64) -> Result<Tensor>;

    /// Nearest neighbor resizing on the last two dimensions.
    ///
    /// The source row of output row `y` is `floor(y * height / new_height)`,
    /// the same rule OpenCV uses for `INTER_NEAREST`. The input kind is kept,
    /// so boolean maps stay boolean.
    fn f_resize_nearest2d(&self, new_height: i64, new_width: i64) -> Result<Tensor>;

    fn resize_nearest2d(&self, new_height: i64, new_width: i64) -> Tensor {
        self.f_resize_nearest2d(new_height, new_width).unwrap()
    }

    /// Extracts the `height` by `width` window starting at `(top, left)`.
    ///
    /// The window may lie partially or entirely outside of the input. Those
    /// regions are filled with zeros.
    fn f_crop_or_pad2d(&self, top: i64, left: i64, height: i64, width: i64) -> Result<Tensor>;

    fn crop_or_pad2d(&self, top: i64, left: i64, height: i64, width: i64) -> Tensor {
        self.f_crop_or_pad2d(top, left, height, width).unwrap()
    }

    /// Warps a `[height, width]` or `[channels, height, width]` tensor by an
    /// affine transform on pixel coordinates. The output keeps the input shape
    /// and kind. Out of image regions are filled with zeros.
    fn f_warp_affine2d(&self, transform: &Affine2, interpolation: Interpolation)
        -> Result<Tensor>;
}

impl TensorExt for Tensor {
    fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    fn f_fill_rect_(
        &mut self,
        top: i64,
        left: i64,
        bottom: i64,
        right: i64,
        color: &Tensor,
    ) -> Result<Tensor> {
        tch::no_grad(|| -> Result<_> {
            match *self.size().as_slice() {
                [_bsize, n_channels, height, width] => {
                    ensure!(
                        color.size1()? == n_channels,
                        "the number of channels of input and color tensors do not match"
                    );
                    let (top, bottom) = (top.clamp(0, height), bottom.clamp(0, height));
                    let (left, right) = (left.clamp(0, width), right.clamp(0, width));
                    if top < bottom && left < right {
                        let mut rect = self.i((.., .., top..bottom, left..right));
                        let expanded_color =
                            color.f_view([1, n_channels, 1, 1])?.f_expand_as(&rect)?;
                        rect.f_copy_(&expanded_color)?;
                    }
                }
                [n_channels, height, width] => {
                    ensure!(
                        color.size1()? == n_channels,
                        "the number of channels of input and color tensors do not match"
                    );
                    let (top, bottom) = (top.clamp(0, height), bottom.clamp(0, height));
                    let (left, right) = (left.clamp(0, width), right.clamp(0, width));
                    if top < bottom && left < right {
                        let mut rect = self.i((.., top..bottom, left..right));
                        let expanded_color =
                            color.f_view([n_channels, 1, 1])?.f_expand_as(&rect)?;
                        rect.f_copy_(&expanded_color)?;
                    }
                }
                _ => bail!("invalid shape: expect three or four dims"),
            }
            Ok(())
        })?;

        Ok(self.shallow_clone())
    }

    fn f_resize2d_exact(&self, new_height: i64, new_width: i64) -> Result<Tensor> {
        ensure!(
            new_height > 0 && new_width > 0,
            "the target size must be positive"
        );

        tch::no_grad(|| match (self.kind(), self.size().as_slice()) {
            (Kind::Uint8, &[_n_channels, _height, _width]) => {
                let resized = vision::image::resize(self, new_width, new_height)?;
                Ok(resized)
            }
            (Kind::Float, &[_n_channels, _height, _width]) => {
                let resized = vision::image::resize(
                    &(self * 255.0).to_kind(Kind::Uint8),
                    new_width,
                    new_height,
                )?
                .to_kind(Kind::Float)
                    / 255.0;
                Ok(resized)
            }
            (_, &[_n_channels, _height, _width]) => bail!("unsupported data kind"),
            _ => bail!("invalid shape: expect three dimensions"),
        })
    }

    fn f_resize_nearest2d(&self, new_height: i64, new_width: i64) -> Result<Tensor> {
        ensure!(
            new_height > 0 && new_width > 0,
            "the target size must be positive"
        );
        let ndim = self.dim();
        ensure!(
            ndim >= 2,
            "expect at least two dimensions, but get shape {:?}",
            self.size()
        );
        let shape = self.size();
        let height = shape[ndim - 2];
        let width = shape[ndim - 1];
        ensure!(height > 0 && width > 0, "cannot resize an empty map");

        if height == new_height && width == new_width {
            return Ok(self.shallow_clone());
        }

        let source_indices = |src: i64, dst: i64| -> Tensor {
            let indices: Vec<i64> = (0..dst).map(|pos| (pos * src / dst).min(src - 1)).collect();
            Tensor::of_slice(&indices).to_device(self.device())
        };
        let rows = source_indices(height, new_height);
        let cols = source_indices(width, new_width);

        let resized = tch::no_grad(|| -> Result<_> {
            let resized = self
                .f_index_select(ndim as i64 - 2, &rows)?
                .f_index_select(ndim as i64 - 1, &cols)?;
            Ok(resized)
        })?;

        Ok(resized)
    }

    fn f_crop_or_pad2d(&self, top: i64, left: i64, height: i64, width: i64) -> Result<Tensor> {
        ensure!(height > 0 && width > 0, "the window size must be positive");
        let ndim = self.dim();
        ensure!(
            ndim >= 2,
            "expect at least two dimensions, but get shape {:?}",
            self.size()
        );
        let shape = self.size();
        let h_dim = ndim as i64 - 2;
        let w_dim = ndim as i64 - 1;
        let orig_h = shape[ndim - 2];
        let orig_w = shape[ndim - 1];

        let new_shape: Vec<i64> = shape[..(ndim - 2)]
            .iter()
            .cloned()
            .chain([height, width])
            .collect();

        tch::no_grad(|| -> Result<_> {
            let output = Tensor::zeros(new_shape.as_slice(), (self.kind(), self.device()));

            // the part of the window that overlaps with the input
            let src_t = top.max(0);
            let src_b = (top + height).min(orig_h);
            let src_l = left.max(0);
            let src_r = (left + width).min(orig_w);

            if src_t < src_b && src_l < src_r {
                let patch = self
                    .f_narrow(h_dim, src_t, src_b - src_t)?
                    .f_narrow(w_dim, src_l, src_r - src_l)?;
                output
                    .f_narrow(h_dim, src_t - top, src_b - src_t)?
                    .f_narrow(w_dim, src_l - left, src_r - src_l)?
                    .f_copy_(&patch)?;
            }

            Ok(output)
        })
    }

    fn f_warp_affine2d(
        &self,
        transform: &Affine2,
        interpolation: Interpolation,
    ) -> Result<Tensor> {
        let orig_shape = self.size();
        let (channels, height, width) = match *orig_shape.as_slice() {
            [height, width] => (1, height, width),
            [channels, height, width] => (channels, height, width),
            _ => bail!(
                "expect a [height, width] or [channels, height, width] tensor, but get {:?}",
                orig_shape
            ),
        };
        let kind = self.kind();
        let device = self.device();

        tch::no_grad(|| -> Result<_> {
            let theta = transform.f_grid_theta(height, width)?.to_device(device);
            let affine_grid =
                Tensor::affine_grid_generator(&theta, &[1, channels, height, width], false);
            let warped = self
                .to_kind(Kind::Float)
                .f_view([1, channels, height, width])?
                .grid_sampler(
                    &affine_grid,
                    interpolation.grid_sampler_mode(),
                    0,
                    false,
                )
                .f_view(orig_shape.as_slice())?;

            let warped = match kind {
                Kind::Float => warped,
                Kind::Double | Kind::Half => warped.to_kind(kind),
                Kind::Bool => warped.gt(0.5),
                Kind::Uint8 => warped.round().clamp(0.0, 255.0).to_kind(kind),
                _ => warped.round().to_kind(kind),
            };

            Ok(warped)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_nearest_is_idempotent() -> Result<()> {
        let mask = Tensor::rand(&[37, 53], (Kind::Float, Device::Cpu)).gt(0.5);

        let once = mask.f_resize_nearest2d(20, 30)?;
        let twice = once.f_resize_nearest2d(20, 30)?;
        assert_eq!(once.size(), [20, 30]);
        assert_eq!(once.kind(), Kind::Bool);
        assert!(once.equal(&twice));
        Ok(())
    }

    #[test]
    fn resize_nearest_picks_floor_rows() -> Result<()> {
        let map = Tensor::arange(4i64, (Kind::Int64, Device::Cpu)).view([1, 4]);
        let resized = map.f_resize_nearest2d(1, 8)?;
        let values: Vec<i64> = resized.view([-1]).into();
        assert_eq!(values, vec![0, 0, 1, 1, 2, 2, 3, 3]);

        let resized = map.f_resize_nearest2d(1, 2)?;
        let values: Vec<i64> = resized.view([-1]).into();
        assert_eq!(values, vec![0, 2]);
        Ok(())
    }

    #[test]
    fn resize_nearest_per_channel() -> Result<()> {
        let image = Tensor::ones(&[3, 8, 8], (Kind::Uint8, Device::Cpu));
        let resized = image.f_resize_nearest2d(4, 6)?;
        assert_eq!(resized.size(), [3, 4, 6]);
        assert_eq!(i64::from(resized.sum(Kind::Int64)), 3 * 4 * 6);
        Ok(())
    }

    #[test]
    fn crop_or_pad_window() -> Result<()> {
        let image = Tensor::ones(&[3, 4, 6], (Kind::Uint8, Device::Cpu));

        // pure crop
        let cropped = image.f_crop_or_pad2d(1, 2, 2, 3)?;
        assert_eq!(cropped.size(), [3, 2, 3]);
        assert_eq!(i64::from(cropped.sum(Kind::Int64)), 3 * 2 * 3);

        // centered padding
        let padded = image.f_crop_or_pad2d(-2, -1, 8, 8)?;
        assert_eq!(padded.size(), [3, 8, 8]);
        assert_eq!(i64::from(padded.sum(Kind::Int64)), 3 * 4 * 6);
        assert_eq!(padded.int64_value(&[0, 2, 1]), 1);
        assert_eq!(padded.int64_value(&[0, 1, 1]), 0);

        // disjoint window
        let empty = image.f_crop_or_pad2d(10, 10, 2, 2)?;
        assert_eq!(i64::from(empty.sum(Kind::Int64)), 0);
        Ok(())
    }

    #[test]
    fn warp_identity_keeps_image() -> Result<()> {
        let image = (Tensor::rand(&[3, 9, 7], (Kind::Float, Device::Cpu)) * 255.0)
            .to_kind(Kind::Uint8);
        let warped = image.f_warp_affine2d(&Affine2::identity(), Interpolation::Bilinear)?;
        assert_eq!(warped.kind(), Kind::Uint8);
        assert!(warped.equal(&image));
        Ok(())
    }

    #[test]
    fn warp_translation_moves_pixel() -> Result<()> {
        let mask = Tensor::zeros(&[5, 5], (Kind::Bool, Device::Cpu));
        let _ = mask.i((2i64, 1i64)).fill_(1i64);

        let warped =
            mask.f_warp_affine2d(&Affine2::translation(2.0, 1.0), Interpolation::Nearest)?;
        assert_eq!(warped.kind(), Kind::Bool);
        assert_eq!(i64::from(warped.sum(Kind::Int64)), 1);
        assert_eq!(warped.int64_value(&[3, 3]), 1);
        Ok(())
    }

    #[test]
    fn fill_rect_clamps_to_image() -> Result<()> {
        let mut image = Tensor::zeros(&[3, 4, 4], (Kind::Uint8, Device::Cpu));
        let color = Tensor::of_slice(&[255u8, 0, 0]);
        image.f_fill_rect_(-1, -1, 2, 2, &color)?;
        assert_eq!(image.int64_value(&[0, 1, 1]), 255);
        assert_eq!(image.int64_value(&[1, 1, 1]), 0);
        assert_eq!(i64::from(image.sum(Kind::Int64)), 255 * 4);

        // fully outside
        image.f_fill_rect_(10, 10, 12, 12, &color)?;
        assert_eq!(i64::from(image.sum(Kind::Int64)), 255 * 4);
        Ok(())
    }
}
