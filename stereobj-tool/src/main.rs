use anyhow::{ensure, Context, Result};
use futures::stream::{self, StreamExt as _};
use log::{info, warn};
use par_stream::prelude::*;
use prettytable::{cell, row, Table};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use stereobj::{
    DatasetConfig, GenericDataset, PoseSample, RandomAccessDataset, StereoObjDataset,
    StereoObjDatasetInit,
};
use structopt::StructOpt;
use tch::{vision, Kind, Tensor};
use tch_goodies::TensorExt as _;

#[derive(Debug, Clone, StructOpt)]
/// Inspect a stereo object pose dataset.
enum Args {
    /// Print a summary of the dataset.
    Info {
        #[structopt(long)]
        /// dataset configuration file
        config: PathBuf,
    },
    /// Load one sample and optionally render its labels.
    Show {
        #[structopt(long)]
        /// dataset configuration file
        config: PathBuf,
        #[structopt(long, default_value = "0")]
        /// sample index
        index: usize,
        #[structopt(long)]
        /// output image file with keypoints and mask drawn
        output: Option<PathBuf>,
    },
    /// Load every sample concurrently and report failures.
    Scan {
        #[structopt(long)]
        /// dataset configuration file
        config: PathBuf,
        #[structopt(long)]
        /// number of worker threads, defaults to the number of CPUs
        workers: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    match Args::from_args() {
        Args::Info { config } => info(config)?,
        Args::Show {
            config,
            index,
            output,
        } => show(config, index, output)?,
        Args::Scan { config, workers } => scan(config, workers).await?,
    }

    Ok(())
}

fn load_dataset(config_file: impl AsRef<Path>) -> Result<StereoObjDataset> {
    let config_file = config_file.as_ref();
    let config = DatasetConfig::open(config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))?;
    StereoObjDatasetInit::new(config).build()
}

fn info(config_file: impl AsRef<Path>) -> Result<()> {
    let dataset = load_dataset(config_file)?;
    let config = dataset.config();
    let camera = dataset.camera();

    let mut table = Table::new();
    table.add_row(row!["data dir", config.data_dir.display()]);
    table.add_row(row!["class", dataset.cls_type()]);
    table.add_row(row!["split", config.split]);
    table.add_row(row!["samples", dataset.num_records()]);
    table.add_row(row!["keypoints", dataset.num_keypoints()]);
    table.add_row(row!["stereo", dataset.is_stereo()]);
    table.add_row(row![
        "output size",
        format!("{}x{}", config.image_height, config.image_width)
    ]);
    table.add_row(row!["baseline", camera.baseline()]);

    [("left", camera.intrinsics_l()), ("right", camera.intrinsics_r())]
        .iter()
        .for_each(|(view, intrinsics)| {
            table.add_row(row![
                format!("{} intrinsics", view),
                format!(
                    "fx={} fy={} cx={} cy={}",
                    intrinsics.fx(),
                    intrinsics.fy(),
                    intrinsics.cx(),
                    intrinsics.cy()
                )
            ]);
        });

    table.printstd();
    Ok(())
}

fn show(config_file: impl AsRef<Path>, index: usize, output: Option<PathBuf>) -> Result<()> {
    let dataset = load_dataset(config_file)?;
    let sample = dataset.nth(index)?;

    info!("sample {} is '{}'", index, sample.img_id());
    info!("kpt_3d shape {:?}", sample.kpt_3d().size());
    match &sample {
        PoseSample::Mono(sample) => {
            info!("inp shape {:?}", sample.inp.size());
            if let Some(annotation) = &sample.annotation {
                info!("uv shape {:?}", annotation.uv.size());
            }
        }
        PoseSample::Stereo(sample) => {
            info!(
                "inp_l shape {:?}, inp_r shape {:?}",
                sample.inp_l.size(),
                sample.inp_r.size()
            );
            if let Some(annotation) = &sample.annotation {
                info!(
                    "uv_l shape {:?}, uv_r shape {:?}",
                    annotation.uv_l.size(),
                    annotation.uv_r.size()
                );
            }
        }
    }
    match sample.pose_gt() {
        Some(pose_gt) => {
            let values: Vec<f64> = pose_gt.view([-1]).into();
            values.chunks(4).for_each(|row| info!("pose_gt {:?}", row));
        }
        None => info!("the sample is not annotated"),
    }

    if let Some(output) = output {
        let image = render(&sample)?;
        vision::image::save(&image, &output)
            .with_context(|| format!("failed to save image '{}'", output.display()))?;
        info!("saved rendered image to '{}'", output.display());
    }

    Ok(())
}

/// Draws the mask and the keypoints onto the left image.
fn render(sample: &PoseSample) -> Result<Tensor> {
    let (image, keypoints) = match sample {
        PoseSample::Mono(sample) => (
            &sample.inp,
            sample.annotation.as_ref().map(|ann| &ann.uv),
        ),
        PoseSample::Stereo(sample) => (
            &sample.inp_l,
            sample.annotation.as_ref().map(|ann| &ann.uv_l),
        ),
    };
    let (channels, _, _) = image.size3()?;
    ensure!(channels == 3, "expect a RGB image");

    let mut image = match sample.mask() {
        Some(mask) => {
            let tint = Tensor::of_slice(&[0.0f32, 255.0, 0.0]).view([3, 1, 1]);
            let blended = (image.to_kind(Kind::Float) * 0.5 + tint * 0.5).to_kind(Kind::Uint8);
            blended.where_self(&mask.to_kind(Kind::Bool).unsqueeze(0), image)
        }
        None => image.copy(),
    };

    if let Some(keypoints) = keypoints {
        let color = Tensor::of_slice(&[255u8, 0, 0]);
        let values: Vec<f32> = keypoints.view([-1]).into();
        for point in values.chunks_exact(2) {
            let x = point[0].round() as i64;
            let y = point[1].round() as i64;
            image.f_fill_rect_(y - 2, x - 2, y + 3, x + 3, &color)?;
        }
    }

    Ok(image)
}

async fn scan(config_file: impl AsRef<Path>, workers: Option<usize>) -> Result<()> {
    let dataset = Arc::new(load_dataset(config_file)?);
    let num_records = dataset.num_records();
    let workers = workers.unwrap_or_else(num_cpus::get);

    let failures: Vec<_> = stream::iter(0..num_records)
        .par_map_unordered(workers, move |index| {
            let dataset = dataset.clone();
            move || {
                let result = dataset.nth(index).map(|_| ());
                (dataset.samples()[index].clone(), result)
            }
        })
        .filter_map(|(img_id, result)| async move {
            let err = result.err()?;
            warn!("failed to load sample '{}': {:#}", img_id, err);
            Some(img_id)
        })
        .collect()
        .await;

    info!("scanned {} samples, {} failed", num_records, failures.len());
    ensure!(
        failures.is_empty(),
        "{} of {} samples failed to load",
        failures.len(),
        num_records
    );
    Ok(())
}
