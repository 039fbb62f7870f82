use serde::{Deserialize, Serialize};

use crate::labels::LabelSet;

/// Snapshot of the classification backend for `/model-info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub device: String,
    pub model_loaded: bool,
    /// Empty until the model has loaded.
    #[serde(default, with = "optional_labels")]
    pub labels: Option<LabelSet>,
    pub num_labels: usize,
}

/// `None` serializes as `{}` so the field shape never changes.
mod optional_labels {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::labels::LabelSet;

    pub fn serialize<S: Serializer>(labels: &Option<LabelSet>, s: S) -> Result<S::Ok, S::Error> {
        match labels {
            Some(l) => l.serialize(s),
            None => BTreeMap::<String, String>::new().serialize(s),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<LabelSet>, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(d)?;
        if raw.is_empty() {
            return Ok(None);
        }
        LabelSet::from_id2label(raw.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
