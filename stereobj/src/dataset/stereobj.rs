use super::*;
use crate::{
    camera::{Intrinsics, StereoCamera},
    common::*,
    config::DatasetConfig,
    error::DatasetError,
    keypoint::{keypoints_to_tensor, project_keypoints, KeypointTemplate},
    label::RtLabel,
    mask::{resize_binary_map, SparseMask},
    prob::ProbEstimator,
    processor::AugmentationInit,
    profiling::Timing,
    record::{ImageId, MonoAnnotation, MonoSample, PoseSample, StereoAnnotation, StereoSample},
    split::load_split,
    transform::{AugmentTransform, SampleTransform, TransformView},
};

/// The view name of mask labels belonging to the left image.
const LEFT_VIEW: &str = "left";

/// The options to build a [`StereoObjDataset`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct StereoObjDatasetInit {
    pub config: DatasetConfig,
    /// The transform applied to annotated views. If unset and the config
    /// enables augmentation, the augmentation transform is used.
    #[derivative(Debug = "ignore")]
    pub transform: Option<Arc<dyn SampleTransform>>,
    /// Computes the `prob` field of annotated samples.
    #[derivative(Debug = "ignore")]
    pub prob_estimator: Option<Arc<dyn ProbEstimator>>,
}

impl StereoObjDatasetInit {
    pub fn new(config: DatasetConfig) -> Self {
        Self {
            config,
            transform: None,
            prob_estimator: None,
        }
    }

    pub fn build(self) -> Result<StereoObjDataset> {
        let Self {
            config,
            transform,
            prob_estimator,
        } = self;

        let augmentation = config
            .augmentation
            .as_ref()
            .map(|augmentation| AugmentationInit::from(augmentation).build())
            .transpose()
            .context("invalid augmentation options")?;
        let transform = match (transform, augmentation) {
            (Some(transform), _) => Some(transform),
            (None, Some(augmentation)) => {
                Some(Arc::new(AugmentTransform::from(augmentation)) as Arc<dyn SampleTransform>)
            }
            (None, None) => None,
        };

        let camera = StereoCamera::load(config.camera_file())?;
        let template = KeypointTemplate::load(config.keypoint_file())?;
        let samples = load_split(config.split_file())?;

        if template.len() < config.num_kp.get() {
            warn!(
                "the keypoint template of '{}' has {} points, fewer than the requested {}",
                config.cls_type,
                template.len(),
                config.num_kp
            );
        }
        info!(
            "loaded {} '{}' samples of the '{}' split with {} keypoints",
            samples.len(),
            config.cls_type,
            config.split,
            template.len().min(config.num_kp.get())
        );

        Ok(StereoObjDataset {
            config,
            samples,
            camera,
            template,
            transform,
            prob_estimator,
        })
    }
}

/// The stereo object pose dataset.
///
/// Each sample is decoded from files on demand, so the dataset can be shared
/// across threads and accessed concurrently.
#[derive(Derivative, Getters)]
#[derivative(Debug)]
pub struct StereoObjDataset {
    #[getset(get = "pub")]
    config: DatasetConfig,
    #[getset(get = "pub")]
    samples: Vec<ImageId>,
    #[getset(get = "pub")]
    camera: StereoCamera,
    #[getset(get = "pub")]
    template: KeypointTemplate,
    #[derivative(Debug = "ignore")]
    transform: Option<Arc<dyn SampleTransform>>,
    #[derivative(Debug = "ignore")]
    prob_estimator: Option<Arc<dyn ProbEstimator>>,
}

impl GenericDataset for StereoObjDataset {
    fn cls_type(&self) -> &str {
        &self.config.cls_type
    }

    fn num_keypoints(&self) -> usize {
        self.template.len().min(self.config.num_kp.get())
    }

    fn is_stereo(&self) -> bool {
        self.config.stereo
    }
}

impl RandomAccessDataset for StereoObjDataset {
    fn num_records(&self) -> usize {
        self.samples.len()
    }

    fn nth(&self, index: usize) -> Result<PoseSample> {
        let img_id = self
            .samples
            .get(index)
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.samples.len(),
            })?;

        tch::no_grad(|| -> Result<_> {
            let mut timing = Timing::new("stereobj_nth");

            let (inp_l, inp_r) = self.load_image(img_id)?;
            timing.set_record("load image");

            let sample = if self.config.is_annotated() {
                let annotation = self.load_annotation(img_id)?;
                timing.set_record("load annotation");

                let mut rng = self.sample_rng(index);
                let sample =
                    self.annotated_sample(img_id, inp_l, inp_r, annotation, &mut rng)?;
                timing.set_record("transform");
                sample
            } else {
                self.unannotated_sample(img_id, inp_l, inp_r)
            };

            timing.report();
            Ok(sample)
        })
    }
}

/// The ground truth of the selected object, before any transform.
struct RawAnnotation {
    uv_l: Tensor,
    uv_r: Option<Tensor>,
    mask: Tensor,
    pose_gt: Tensor,
}

impl StereoObjDataset {
    fn output_size(&self) -> (i64, i64) {
        (
            self.config.image_height.get() as i64,
            self.config.image_width.get() as i64,
        )
    }

    /// The ratio of the output resolution to the native resolution along
    /// `(x, y)`. Keypoints are labeled at the native resolution.
    fn output_scale(&self) -> (f64, f64) {
        let (height, width) = self.output_size();
        let native_size = self.config.native_size.get() as f64;
        (width as f64 / native_size, height as f64 / native_size)
    }

    /// The intrinsics of the left and right views at the output resolution.
    fn output_intrinsics(&self) -> (Intrinsics, Intrinsics) {
        let (sx, sy) = self.output_scale();
        (
            self.camera.intrinsics_l().scaled(sx, sy),
            self.camera.intrinsics_r().scaled(sx, sy),
        )
    }

    fn sample_rng(&self, index: usize) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        }
    }

    /// Loads the side-by-side stereo image and splits it into the left view
    /// and, in stereo mode, the right view.
    fn load_image(&self, img_id: &ImageId) -> Result<(Tensor, Option<Tensor>)> {
        let (height, width) = self.output_size();
        let path = img_id.image_file(&self.config.data_dir);
        let image = vision::image::load(&path)
            .with_context(|| format!("failed to load image file '{}'", path.display()))?
            .f_resize2d_exact(height, width * 2)?;

        let inp_l = image.narrow(2, 0, width).contiguous();
        let inp_r = self
            .config
            .stereo
            .then(|| image.narrow(2, width, width).contiguous());

        Ok((inp_l, inp_r))
    }

    fn load_annotation(&self, img_id: &ImageId) -> Result<RawAnnotation> {
        let data_dir = &self.config.data_dir;
        let (height, width) = self.output_size();
        let native_size = self.config.native_size.get();

        let label_file = img_id.rt_label_file(data_dir);
        let label = RtLabel::load(&label_file)?;
        let object = label
            .find_class(&self.config.cls_type)
            .ok_or_else(|| DatasetError::MissingClass {
                path: label_file.clone(),
                cls_type: self.config.cls_type.clone(),
            })?;
        let pose = label
            .pose(object)
            .with_context(|| format!("invalid label file '{}'", label_file.display()))?;

        let scale = self.output_scale();
        let points = self.template.truncated(self.config.num_kp.get());
        let intrinsics = self.camera.intrinsics_l();

        let uv_l = project_keypoints(
            points,
            &pose.rotation,
            &pose.translation,
            &intrinsics,
            scale,
        );
        let uv_r = self.config.stereo.then(|| {
            let translation = pose.shifted_translation([-self.camera.baseline(), 0.0, 0.0]);
            project_keypoints(points, &pose.rotation, &translation, &intrinsics, scale)
        });

        let mask_file = img_id.mask_label_file(data_dir);
        let mask = SparseMask::load(&mask_file, LEFT_VIEW, object)?;
        if mask.is_empty() {
            debug!("object '{}' is not visible in '{}'", object, img_id);
        }
        let mask = mask
            .decode(native_size as i64)
            .with_context(|| format!("invalid mask file '{}'", mask_file.display()))?;
        let mask = resize_binary_map(&mask, height, width)?.to_kind(Kind::Uint8);

        Ok(RawAnnotation {
            uv_l: keypoints_to_tensor(&uv_l),
            uv_r: uv_r.map(|uv_r| keypoints_to_tensor(&uv_r)),
            mask,
            pose_gt: pose.pose_tensor(),
        })
    }

    fn transform_view(&self, view: TransformView, rng: &mut StdRng) -> Result<TransformView> {
        let view = match &self.transform {
            Some(transform) => transform.forward(view, rng)?,
            None => view,
        };
        Ok(TransformView {
            mask: view.mask.to_kind(Kind::Uint8),
            ..view
        })
    }

    fn compute_prob(&self, mask: &Tensor, kpt_2d: &Tensor) -> Result<Option<Tensor>> {
        self.prob_estimator
            .as_ref()
            .map(|estimator| estimator.compute(mask, kpt_2d))
            .transpose()
    }

    fn annotated_sample(
        &self,
        img_id: &ImageId,
        inp_l: Tensor,
        inp_r: Option<Tensor>,
        annotation: RawAnnotation,
        rng: &mut StdRng,
    ) -> Result<PoseSample> {
        let RawAnnotation {
            uv_l,
            uv_r,
            mask,
            pose_gt,
        } = annotation;
        let kpt_3d = self.template.to_tensor(self.config.num_kp.get());
        let baseline = self.camera.baseline();
        let (intrinsics_l, intrinsics_r) = self.output_intrinsics();

        let left = self.transform_view(
            TransformView {
                image: inp_l,
                kpt_2d: uv_l,
                mask: mask.shallow_clone(),
                k: intrinsics_l.to_tensor(),
            },
            rng,
        )?;

        let sample = match (inp_r, uv_r) {
            (Some(inp_r), Some(uv_r)) => {
                // the mask belongs to the left view, the right one is dropped
                let right = self.transform_view(
                    TransformView {
                        image: inp_r,
                        kpt_2d: uv_r,
                        mask,
                        k: intrinsics_r.to_tensor(),
                    },
                    rng,
                )?;
                let prob = self.compute_prob(&left.mask, &left.kpt_2d)?;

                PoseSample::Stereo(StereoSample {
                    img_id: img_id.clone(),
                    inp_l: left.image,
                    inp_r: right.image,
                    k_l: left.k,
                    k_r: right.k,
                    kpt_3d,
                    baseline,
                    annotation: Some(StereoAnnotation {
                        uv_l: left.kpt_2d,
                        uv_r: right.kpt_2d,
                        mask: left.mask,
                        prob,
                        pose_gt,
                    }),
                })
            }
            (None, None) => {
                let prob = self.compute_prob(&left.mask, &left.kpt_2d)?;

                PoseSample::Mono(MonoSample {
                    img_id: img_id.clone(),
                    inp: left.image,
                    k: left.k,
                    kpt_3d,
                    baseline,
                    annotation: Some(MonoAnnotation {
                        uv: left.kpt_2d,
                        mask: left.mask,
                        prob,
                        pose_gt,
                    }),
                })
            }
            _ => bail!("the right image and the right keypoints must be loaded together"),
        };

        Ok(sample)
    }

    fn unannotated_sample(
        &self,
        img_id: &ImageId,
        inp_l: Tensor,
        inp_r: Option<Tensor>,
    ) -> PoseSample {
        let kpt_3d = self.template.to_tensor(self.config.num_kp.get());
        let baseline = self.camera.baseline();
        let (intrinsics_l, intrinsics_r) = self.output_intrinsics();
        let k_l = intrinsics_l.to_tensor();

        match inp_r {
            Some(inp_r) => PoseSample::Stereo(StereoSample {
                img_id: img_id.clone(),
                inp_l,
                inp_r,
                k_l,
                k_r: intrinsics_r.to_tensor(),
                kpt_3d,
                baseline,
                annotation: None,
            }),
            None => PoseSample::Mono(MonoSample {
                img_id: img_id.clone(),
                inp: inp_l,
                k: k_l,
                kpt_3d,
                baseline,
                annotation: None,
            }),
        }
    }
}
