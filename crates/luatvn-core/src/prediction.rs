//! Classification result and the score math behind it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::labels::LabelSet;

/// Outcome of classifying one text.
///
/// `all_scores` are softmax probabilities in label order; `predicted_class`
/// is their argmax with the lowest index winning ties, and `confidence` is
/// the score at that index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_class: usize,
    pub confidence: f32,
    pub all_scores: Vec<f32>,
    pub predicted_label: String,
    /// Label name → score, in label order.
    pub all_labels: Map<String, Value>,
}

impl PredictionResult {
    /// Build a result from raw class logits.
    ///
    /// `logits.len()` must equal `labels.len()`; callers check this at model
    /// load time.
    pub fn from_logits(logits: &[f32], labels: &LabelSet) -> Self {
        Self::from_scores(softmax(logits), labels)
    }

    /// Build a result from already-normalized probabilities.
    pub fn from_scores(all_scores: Vec<f32>, labels: &LabelSet) -> Self {
        let predicted_class = stable_argmax(&all_scores).unwrap_or(0);
        let confidence = all_scores.get(predicted_class).copied().unwrap_or(0.0);
        let predicted_label = label_or_placeholder(labels, predicted_class);

        let mut all_labels = Map::with_capacity(all_scores.len());
        for (idx, &score) in all_scores.iter().enumerate() {
            all_labels.insert(label_or_placeholder(labels, idx), Value::from(score));
        }

        Self {
            predicted_class,
            confidence,
            all_scores,
            predicted_label,
            all_labels,
        }
    }
}

fn label_or_placeholder(labels: &LabelSet, idx: usize) -> String {
    labels
        .get(idx)
        .map(str::to_string)
        .unwrap_or_else(|| format!("LABEL_{idx}"))
}

/// Numerically stable softmax, accumulated in f64.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&x| (x as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| (e / sum) as f32).collect()
}

/// Index of the maximum value; the first occurrence wins ties.
///
/// NaN values never win. Returns `None` for an empty slice.
pub fn stable_argmax(values: &[f32]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut best_idx = 0;
    let mut best = f32::NEG_INFINITY;
    for (idx, &v) in values.iter().enumerate() {
        // Strict `>` keeps the earliest index on ties.
        if v > best {
            best = v;
            best_idx = idx;
        }
    }
    Some(best_idx)
}
