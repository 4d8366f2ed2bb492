use crate::common::*;

/// Identifies an image by its scene subdirectory and its id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageId {
    pub subdir: String,
    pub image_id: String,
}

impl ImageId {
    pub fn new(subdir: impl Into<String>, image_id: impl Into<String>) -> Self {
        Self {
            subdir: subdir.into(),
            image_id: image_id.into(),
        }
    }

    pub fn image_file(&self, data_dir: &Path) -> PathBuf {
        data_dir
            .join(&self.subdir)
            .join(format!("{}.jpg", self.image_id))
    }

    pub fn rt_label_file(&self, data_dir: &Path) -> PathBuf {
        data_dir
            .join(&self.subdir)
            .join(format!("{}_rt_label.json", self.image_id))
    }

    pub fn mask_label_file(&self, data_dir: &Path) -> PathBuf {
        data_dir
            .join(&self.subdir)
            .join(format!("{}_mask_label.npz", self.image_id))
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subdir, self.image_id)
    }
}

/// A loaded sample, either monocular or stereo.
#[derive(Debug)]
pub enum PoseSample {
    Mono(MonoSample),
    Stereo(StereoSample),
}

impl PoseSample {
    pub fn img_id(&self) -> &ImageId {
        match self {
            Self::Mono(sample) => &sample.img_id,
            Self::Stereo(sample) => &sample.img_id,
        }
    }

    pub fn kpt_3d(&self) -> &Tensor {
        match self {
            Self::Mono(sample) => &sample.kpt_3d,
            Self::Stereo(sample) => &sample.kpt_3d,
        }
    }

    pub fn baseline(&self) -> f64 {
        match self {
            Self::Mono(sample) => sample.baseline,
            Self::Stereo(sample) => sample.baseline,
        }
    }

    pub fn pose_gt(&self) -> Option<&Tensor> {
        match self {
            Self::Mono(sample) => sample.annotation.as_ref().map(|ann| &ann.pose_gt),
            Self::Stereo(sample) => sample.annotation.as_ref().map(|ann| &ann.pose_gt),
        }
    }

    pub fn mask(&self) -> Option<&Tensor> {
        match self {
            Self::Mono(sample) => sample.annotation.as_ref().map(|ann| &ann.mask),
            Self::Stereo(sample) => sample.annotation.as_ref().map(|ann| &ann.mask),
        }
    }

    pub fn is_annotated(&self) -> bool {
        self.pose_gt().is_some()
    }

    pub fn as_mono(&self) -> Option<&MonoSample> {
        match self {
            Self::Mono(sample) => Some(sample),
            Self::Stereo(_) => None,
        }
    }

    pub fn as_stereo(&self) -> Option<&StereoSample> {
        match self {
            Self::Mono(_) => None,
            Self::Stereo(sample) => Some(sample),
        }
    }

    pub fn shallow_clone(&self) -> Self {
        match self {
            Self::Mono(sample) => Self::Mono(sample.shallow_clone()),
            Self::Stereo(sample) => Self::Stereo(sample.shallow_clone()),
        }
    }
}

/// A sample of the left view only.
#[derive(Debug, TensorLike)]
pub struct MonoSample {
    #[tensor_like(clone)]
    pub img_id: ImageId,
    /// The `[3, height, width]` uint8 image.
    pub inp: Tensor,
    /// The 3x3 intrinsic matrix at the output resolution, after transformation.
    pub k: Tensor,
    /// The `[K, 3]` keypoint template.
    pub kpt_3d: Tensor,
    #[tensor_like(clone)]
    pub baseline: f64,
    /// Ground truth, absent on the test split.
    pub annotation: Option<MonoAnnotation>,
}

#[derive(Debug, TensorLike)]
pub struct MonoAnnotation {
    /// The `[K, 2]` projected keypoints.
    pub uv: Tensor,
    /// The `[height, width]` uint8 instance mask.
    pub mask: Tensor,
    /// The visibility probability, if an estimator is configured.
    pub prob: Option<Tensor>,
    /// The `[3, 4]` matrix `[R | t]`.
    pub pose_gt: Tensor,
}

/// A sample of both stereo views.
#[derive(Debug, TensorLike)]
pub struct StereoSample {
    #[tensor_like(clone)]
    pub img_id: ImageId,
    pub inp_l: Tensor,
    pub inp_r: Tensor,
    /// The 3x3 intrinsic matrices of both views at the output resolution.
    pub k_l: Tensor,
    pub k_r: Tensor,
    pub kpt_3d: Tensor,
    #[tensor_like(clone)]
    pub baseline: f64,
    pub annotation: Option<StereoAnnotation>,
}

#[derive(Debug, TensorLike)]
pub struct StereoAnnotation {
    pub uv_l: Tensor,
    pub uv_r: Tensor,
    /// The instance mask of the left view.
    pub mask: Tensor,
    pub prob: Option<Tensor>,
    pub pose_gt: Tensor,
}
