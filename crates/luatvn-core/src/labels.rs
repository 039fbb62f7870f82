//! Class-index → label mapping for a sequence-classification model.
//!
//! A `LabelSet` is fixed when the model loads: its size equals the model's
//! output dimensionality and its indices run contiguously from 0. On the wire
//! it uses the Hugging Face `id2label` shape, `{"0": "...", "1": "..."}`.

use std::collections::{BTreeMap, HashSet};

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label set is empty")]
    Empty,
    #[error("label index {0:?} is not a non-negative integer")]
    InvalidIndex(String),
    #[error("label indices are not contiguous from 0: missing index {0}")]
    Gap(usize),
    #[error("label name {0:?} is used by more than one index")]
    Duplicate(String),
    #[error("model config is not valid JSON: {0}")]
    Config(String),
}

/// Ordered class labels, index `i` naming output logit `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    /// Names must be unique: they become the keys of `all_labels`.
    pub fn new(names: Vec<String>) -> Result<Self, LabelError> {
        if names.is_empty() {
            return Err(LabelError::Empty);
        }
        let duplicate = {
            let mut seen = HashSet::with_capacity(names.len());
            names.iter().find(|n| !seen.insert(n.as_str())).cloned()
        };
        if let Some(name) = duplicate {
            return Err(LabelError::Duplicate(name));
        }
        Ok(Self { names })
    }

    /// `LABEL_0 .. LABEL_{n-1}`, used when a model ships no `id2label`.
    pub fn placeholder(num_labels: usize) -> Result<Self, LabelError> {
        Self::new((0..num_labels).map(|i| format!("LABEL_{i}")).collect())
    }

    /// Build from an `id2label`-style map with stringified integer keys.
    pub fn from_id2label<'a, I>(entries: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut by_index = BTreeMap::new();
        for (key, name) in entries {
            let idx: usize = key
                .trim()
                .parse()
                .map_err(|_| LabelError::InvalidIndex(key.to_string()))?;
            by_index.insert(idx, name.to_string());
        }

        let mut names = Vec::with_capacity(by_index.len());
        for (expected, (idx, name)) in by_index.into_iter().enumerate() {
            if idx != expected {
                return Err(LabelError::Gap(expected));
            }
            names.push(name);
        }
        Self::new(names)
    }

    /// Read `id2label` from a Transformers `config.json`.
    ///
    /// Returns `Ok(None)` when the config has no `id2label` object.
    pub fn from_model_config(config_json: &str) -> Result<Option<Self>, LabelError> {
        let value: serde_json::Value =
            serde_json::from_str(config_json).map_err(|e| LabelError::Config(e.to_string()))?;
        let Some(map) = value.get("id2label").and_then(|v| v.as_object()) else {
            return Ok(None);
        };
        let entries: Vec<(&str, &str)> = map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|name| (k.as_str(), name)))
            .collect();
        Self::from_id2label(entries).map(Some)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Label for a class index, if in range.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    /// Label names in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }
}

impl Serialize for LabelSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.names.len()))?;
        for (idx, name) in self.iter() {
            map.serialize_entry(&idx.to_string(), name)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LabelSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        Self::from_id2label(raw.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .map_err(D::Error::custom)
    }
}
