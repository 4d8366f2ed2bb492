//! Split manifests listing the images of a dataset split.

use crate::{common::*, record::ImageId};

/// Loads a split manifest mapping each subdirectory to its image ids.
///
/// The returned ids are sorted by subdirectory, then by image id, so the
/// same manifest always yields the same sample order.
pub fn load_split<P>(path: P) -> Result<Vec<ImageId>>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read split file '{}'", path.display()))?;
    let manifest: IndexMap<String, Vec<String>> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse split file '{}'", path.display()))?;
    Ok(flatten_manifest(manifest))
}

fn flatten_manifest(manifest: IndexMap<String, Vec<String>>) -> Vec<ImageId> {
    let mut samples: Vec<_> = manifest
        .into_iter()
        .flat_map(|(subdir, image_ids)| {
            image_ids
                .into_iter()
                .map(move |image_id| ImageId::new(subdir.clone(), image_id))
        })
        .collect();
    samples.sort();
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_sample_index() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("train_hammer.json");
        fs::write(
            &path,
            r#"{
                "mechanics_scene_2": ["000010", "000002"],
                "biolab_scene_1": ["000101", "000001", "000050"],
                "empty_scene": []
            }"#,
        )?;

        let samples = load_split(&path)?;
        assert_eq!(samples.len(), 5);

        let expect = [
            ("biolab_scene_1", "000001"),
            ("biolab_scene_1", "000050"),
            ("biolab_scene_1", "000101"),
            ("mechanics_scene_2", "000002"),
            ("mechanics_scene_2", "000010"),
        ];
        izip!(&samples, expect).for_each(|(sample, (subdir, image_id))| {
            assert_eq!(sample.subdir, subdir);
            assert_eq!(sample.image_id, image_id);
        });

        // loading twice gives the same order
        assert_eq!(load_split(&path)?, samples);
        Ok(())
    }

    #[test]
    fn reject_malformed_split() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("val_hammer.json");
        fs::write(&path, r#"{ "scene": "000001" }"#)?;
        assert!(load_split(&path).is_err());
        assert!(load_split(dir.path().join("missing.json")).is_err());
        Ok(())
    }
}
