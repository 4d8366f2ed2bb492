//! Per-image pose labels.

use crate::common::*;

/// The content of an `<id>_rt_label.json` file.
///
/// `class` maps each object id to its class name and `rt` maps each object id
/// to its pose in the left camera frame. Objects keep their file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtLabel {
    pub class: IndexMap<String, String>,
    pub rt: IndexMap<String, RtEntry>,
}

/// The pose of an object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RtEntry {
    #[serde(rename = "R")]
    pub rotation: [[f64; 3]; 3],
    #[serde(rename = "t")]
    pub translation: [f64; 3],
}

impl RtLabel {
    pub fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read label file '{}'", path.display()))?;
        let label = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse label file '{}'", path.display()))?;
        Ok(label)
    }

    /// The id of the first object labeled with `cls_type`.
    pub fn find_class(&self, cls_type: &str) -> Option<&str> {
        self.class
            .iter()
            .find(|(_, class)| class.as_str() == cls_type)
            .map(|(object, _)| object.as_str())
    }

    pub fn pose(&self, object: &str) -> Result<&RtEntry> {
        self.rt
            .get(object)
            .ok_or_else(|| format_err!("no pose is labeled for object '{}'", object))
    }
}

impl RtEntry {
    /// The `[R | t]` matrix.
    pub fn pose_matrix(&self) -> [[f64; 4]; 3] {
        let row = |index: usize| -> [f64; 4] {
            let [a, b, c] = self.rotation[index];
            [a, b, c, self.translation[index]]
        };
        [row(0), row(1), row(2)]
    }

    /// The `[R | t]` matrix as a `[3, 4]` double tensor.
    pub fn pose_tensor(&self) -> Tensor {
        Tensor::of_slice(&self.pose_matrix().concat()).view([3, 4])
    }

    /// The translation shifted by `offset` in camera coordinates.
    pub fn shifted_translation(&self, offset: [f64; 3]) -> [f64; 3] {
        let [x, y, z] = self.translation;
        let [dx, dy, dz] = offset;
        [x + dx, y + dy, z + dz]
    }
}
