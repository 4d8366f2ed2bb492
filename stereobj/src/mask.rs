//! Sparse instance masks and binary map resizing.

use crate::{common::*, error::DatasetError};

/// The inclusive pixel bounding box of a stored mask patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaskBox {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl MaskBox {
    pub fn height(&self) -> i64 {
        self.y_max - self.y_min + 1
    }

    pub fn width(&self) -> i64 {
        self.x_max - self.x_min + 1
    }
}

/// An instance mask stored as a bounding box and the boolean patch inside it.
///
/// A mask without a box has no visible pixels.
#[derive(Debug)]
pub struct SparseMask {
    region: Option<(MaskBox, Tensor)>,
}

impl SparseMask {
    pub fn empty() -> Self {
        Self { region: None }
    }

    pub fn new(bbox: MaskBox, patch: Tensor) -> Result<Self> {
        ensure!(
            bbox.x_min >= 0 && bbox.y_min >= 0 && bbox.height() > 0 && bbox.width() > 0,
            "invalid mask bounding box {:?}",
            bbox
        );
        let shape = patch.size2()?;
        ensure!(
            shape == (bbox.height(), bbox.width()),
            "the mask patch has shape {:?}, but the bounding box {:?} expects {:?}",
            shape,
            bbox,
            (bbox.height(), bbox.width())
        );

        Ok(Self {
            region: Some((bbox, patch.to_kind(Kind::Bool))),
        })
    }

    /// Builds the sparse form of a full-resolution `[height, width]` mask.
    pub fn encode(mask: &Tensor) -> Result<Self> {
        let _ = mask.size2()?;
        let coords: Vec<i64> = mask.ne(0i64).nonzero().view([-1]).into();
        let (rows, cols): (Vec<_>, Vec<_>) = coords
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .unzip();
        let (y_min, y_max) = match rows.iter().minmax().into_option() {
            Some(range) => range,
            None => return Ok(Self::empty()),
        };
        let (x_min, x_max) = match cols.iter().minmax().into_option() {
            Some(range) => range,
            None => return Ok(Self::empty()),
        };
        let bbox = MaskBox {
            x_min: *x_min,
            x_max: *x_max,
            y_min: *y_min,
            y_max: *y_max,
        };
        let patch = mask
            .narrow(0, bbox.y_min, bbox.height())
            .narrow(1, bbox.x_min, bbox.width())
            .contiguous();

        Self::new(bbox, patch)
    }

    /// Reads the mask of `object` in `view` from a mask label archive.
    ///
    /// The archive stores the arrays `<view>/<object>/bbox`, holding
    /// `[x_min, x_max, y_min, y_max]` or nothing if the object is not visible,
    /// and `<view>/<object>/mask`, holding the patch.
    ///
    /// The StereOBJ-1M release stores masks as a pickled dictionary, which
    /// cannot be read here. Its `_mask_label.npz` files must be converted to
    /// this layout first, e.g. by re-saving each entry with `numpy.savez`.
    pub fn load<P>(path: P, view: &str, object: &str) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let mut arrays: IndexMap<String, Tensor> = Tensor::read_npz(path)
            .with_context(|| format!("failed to read mask file '{}'", path.display()))?
            .into_iter()
            .map(|(name, array)| {
                let name = name.strip_suffix(".npy").unwrap_or(&name).to_owned();
                (name, array)
            })
            .collect();

        let missing = || DatasetError::MissingMask {
            path: path.to_owned(),
            view: view.to_owned(),
            object: object.to_owned(),
        };

        let bbox = arrays
            .remove(&array_name(view, object, "bbox"))
            .ok_or_else(missing)?;
        let bbox: Vec<i64> = bbox.to_kind(Kind::Int64).view([-1]).into();

        let bbox = match *bbox.as_slice() {
            [] => return Ok(Self::empty()),
            [x_min, x_max, y_min, y_max] => {
                if x_min < 0 || y_min < 0 {
                    return Ok(Self::empty());
                }
                MaskBox {
                    x_min,
                    x_max,
                    y_min,
                    y_max,
                }
            }
            _ => bail!(
                "the bounding box of object '{}' in '{}' must have 4 values, but get {:?}",
                object,
                path.display(),
                bbox
            ),
        };
        let patch = arrays
            .remove(&array_name(view, object, "mask"))
            .ok_or_else(missing)?;

        Self::new(bbox, patch).with_context(|| {
            format!(
                "invalid mask of object '{}' in '{}'",
                object,
                path.display()
            )
        })
    }

    /// Writes masks into a mask label archive in the layout read by [`SparseMask::load`].
    pub fn save_npz<P>(masks: &[(&str, &str, &SparseMask)], path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let arrays: Vec<(String, Tensor)> = masks
            .iter()
            .flat_map(|&(view, object, mask)| match &mask.region {
                Some((bbox, patch)) => {
                    let MaskBox {
                        x_min,
                        x_max,
                        y_min,
                        y_max,
                    } = *bbox;
                    vec![
                        (
                            array_name(view, object, "bbox"),
                            Tensor::of_slice(&[x_min, x_max, y_min, y_max]),
                        ),
                        (
                            array_name(view, object, "mask"),
                            patch.to_kind(Kind::Uint8),
                        ),
                    ]
                }
                None => vec![(
                    array_name(view, object, "bbox"),
                    Tensor::zeros(&[0], (Kind::Int64, Device::Cpu)),
                )],
            })
            .collect();

        Tensor::write_npz(&arrays, path.as_ref())
            .with_context(|| format!("failed to write '{}'", path.as_ref().display()))?;
        Ok(())
    }

    pub fn bbox(&self) -> Option<&MaskBox> {
        self.region.as_ref().map(|(bbox, _)| bbox)
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_none()
    }

    /// Expands the mask into a `[native_size, native_size]` boolean map.
    pub fn decode(&self, native_size: i64) -> Result<Tensor> {
        let mask = Tensor::zeros(&[native_size, native_size], (Kind::Bool, Device::Cpu));

        if let Some((bbox, patch)) = &self.region {
            ensure!(
                bbox.x_max < native_size && bbox.y_max < native_size,
                "the mask bounding box {:?} exceeds the image size {}",
                bbox,
                native_size
            );
            mask.narrow(0, bbox.y_min, bbox.height())
                .narrow(1, bbox.x_min, bbox.width())
                .copy_(patch);
        }

        Ok(mask)
    }
}

fn array_name(view: &str, object: &str, field: &str) -> String {
    format!("{}/{}/{}", view, object, field)
}

/// Resizes a binary map with nearest neighbor interpolation.
///
/// The map is either `[height, width]` or `[height, width, channels]`, where
/// each channel is resized independently. The output is boolean and keeps the
/// layout of the input.
pub fn resize_binary_map(binary_map: &Tensor, height: i64, width: i64) -> Result<Tensor> {
    let binary_map = binary_map.ne(0i64);
    let resized = match binary_map.dim() {
        2 => binary_map.f_resize_nearest2d(height, width)?,
        3 => binary_map
            .permute(&[2, 0, 1])
            .f_resize_nearest2d(height, width)?
            .permute(&[1, 2, 0])
            .contiguous(),
        _ => bail!(
            "expect a 2 or 3 dimensional binary map, but get shape {:?}",
            binary_map.size()
        ),
    };
    Ok(resized)
}
