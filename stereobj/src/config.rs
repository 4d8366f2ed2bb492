//! Dataset configuration format.

use crate::common::*;

/// The resolution of each view of the raw stereo images, in pixels.
pub const DEFAULT_NATIVE_SIZE: usize = 1440;

/// The split name whose samples come without ground truth.
pub const TEST_SPLIT: &str = "test";

/// Dataset options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// The dataset root directory.
    pub data_dir: PathBuf,
    /// The object class to load, e.g. `hammer`.
    pub cls_type: String,
    /// The split name, e.g. `train`, `val` or `test`.
    pub split: String,
    /// The output image height.
    pub image_height: NonZeroUsize,
    /// The output image width of each view.
    pub image_width: NonZeroUsize,
    /// The maximum number of keypoints per sample.
    pub num_kp: NonZeroUsize,
    /// If set, load and process both views of the stereo pair.
    #[serde(default)]
    pub stereo: bool,
    /// The side length of each raw view in pixels.
    #[serde(default = "default_native_size")]
    pub native_size: NonZeroUsize,
    /// The seed of per-sample random number generators. Entropy is used if not set.
    #[serde(default)]
    pub seed: Option<u64>,
    /// If set, geometric augmentation is applied to annotated samples.
    #[serde(default)]
    pub augmentation: Option<AugmentationConfig>,
}

impl DatasetConfig {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Self = json5::from_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }

    /// Whether samples of this split carry pose, keypoint and mask labels.
    pub fn is_annotated(&self) -> bool {
        self.split != TEST_SPLIT
    }

    pub fn camera_file(&self) -> PathBuf {
        self.data_dir.join("camera.json")
    }

    pub fn keypoint_file(&self) -> PathBuf {
        self.data_dir
            .join("objects")
            .join(format!("{}.kp", self.cls_type))
    }

    pub fn split_file(&self) -> PathBuf {
        self.data_dir
            .join("split")
            .join(format!("{}_{}.json", self.split, self.cls_type))
    }
}

/// Geometric augmentation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// The range of rotation angles in degrees.
    #[serde(default = "default_rotate_degrees")]
    pub rotate_degrees: (R64, R64),
    /// The range of crop window size relative to the output size.
    #[serde(default = "default_resize_ratio")]
    pub resize_ratio: (R64, R64),
    /// The fraction of the object extent the crop window is placed around.
    #[serde(default = "default_overlap_ratio")]
    pub overlap_ratio: R64,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotate_degrees: default_rotate_degrees(),
            resize_ratio: default_resize_ratio(),
            overlap_ratio: default_overlap_ratio(),
        }
    }
}

fn default_native_size() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_NATIVE_SIZE).unwrap()
}

fn default_rotate_degrees() -> (R64, R64) {
    (r64(-30.0), r64(30.0))
}

fn default_resize_ratio() -> (R64, R64) {
    (r64(0.8), r64(1.2))
}

fn default_overlap_ratio() -> R64 {
    r64(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() -> Result<()> {
        let text = r#"{
            data_dir: "/data/stereobj_1m",
            cls_type: "hammer",
            split: "train",
            image_height: 512,
            image_width: 512,
            num_kp: 20,
        }"#;
        let config: DatasetConfig = json5::from_str(text)?;

        assert!(!config.stereo);
        assert!(config.is_annotated());
        assert_eq!(config.native_size.get(), DEFAULT_NATIVE_SIZE);
        assert!(config.augmentation.is_none());
        assert_eq!(
            config.split_file(),
            Path::new("/data/stereobj_1m/split/train_hammer.json")
        );
        assert_eq!(
            config.keypoint_file(),
            Path::new("/data/stereobj_1m/objects/hammer.kp")
        );
        Ok(())
    }

    #[test]
    fn parse_augmentation_defaults() -> Result<()> {
        let text = r#"{
            data_dir: "data",
            cls_type: "hammer",
            split: "test",
            image_height: 256,
            image_width: 256,
            num_kp: 8,
            stereo: true,
            augmentation: { overlap_ratio: 0.5 },
        }"#;
        let config: DatasetConfig = json5::from_str(text)?;

        assert!(config.stereo);
        assert!(!config.is_annotated());
        let augmentation = config.augmentation.unwrap();
        assert_eq!(augmentation.rotate_degrees, (r64(-30.0), r64(30.0)));
        assert_eq!(augmentation.resize_ratio, (r64(0.8), r64(1.2)));
        assert_eq!(augmentation.overlap_ratio, r64(0.5));
        Ok(())
    }
}
