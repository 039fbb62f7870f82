//! Load-once sequence classification for legal text.
//!
//! [`ClassificationBackend`] owns the one model instance of the process. The
//! model is produced by an [`ArtifactResolver`] (local directory, model hub,
//! or a test fake) and is read-only once loaded. Loading is a guarded state
//! transition: at most one `load()` runs at a time and later callers either
//! wait for it or return immediately if it already succeeded.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use anyhow::anyhow;
use luatvn_core::{Device, LabelSet, ModelInfo, PredictionResult};
use tracing::{debug, error, info};

use crate::error::ClassifyError;

/// A tokenizer + sequence-classification model pair.
///
/// Implementations pad batched inputs and mask the padding, so that a text's
/// logits do not depend on what else is in the batch.
pub trait SequenceClassifier: Send + Sync {
    /// Output dimensionality (number of classes).
    fn num_labels(&self) -> usize;

    /// Raw class logits, one row per input text, in input order.
    fn logits(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Device the model actually runs on.
    fn device(&self) -> Device {
        Device::Cpu
    }
}

/// Model artifacts resolved into memory.
pub struct ResolvedModel {
    pub model: Box<dyn SequenceClassifier>,
    pub labels: LabelSet,
}

/// Turns a model identifier into a loaded model and its labels.
pub trait ArtifactResolver: Send + Sync {
    fn resolve(&self, model_id: &str) -> anyhow::Result<ResolvedModel>;
}

struct Loaded {
    model: Box<dyn SequenceClassifier>,
    labels: LabelSet,
}

/// The process-wide classification backend.
pub struct ClassificationBackend {
    model_name: String,
    device: Device,
    batch_size: usize,
    resolver: Arc<dyn ArtifactResolver>,
    loaded: OnceLock<Loaded>,
    load_lock: Mutex<()>,
}

impl ClassificationBackend {
    pub fn new(
        model_name: impl Into<String>,
        device: Device,
        resolver: Arc<dyn ArtifactResolver>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            device,
            batch_size: 32,
            resolver,
            loaded: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    /// Maximum number of texts sent to the model in one forward pass.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Resolve and load the model. A no-op once it has succeeded.
    ///
    /// Blocks while another thread is loading. A failed load leaves the
    /// backend unloaded; a later call tries again.
    pub fn load(&self) -> Result<(), ClassifyError> {
        if self.is_loaded() {
            return Ok(());
        }
        let _guard = self
            .load_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_loaded() {
            debug!(model = %self.model_name, "model loaded by a concurrent caller");
            return Ok(());
        }

        let start = Instant::now();
        info!(model = %self.model_name, device = %self.device, "loading classification model");

        let loaded = self.resolve().inspect_err(|e| {
            error!(model = %self.model_name, error = %e, "model load failed");
        })?;
        let num_labels = loaded.labels.len();
        let _ = self.loaded.set(loaded);

        info!(
            model = %self.model_name,
            num_labels,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "model loaded"
        );
        Ok(())
    }

    fn resolve(&self) -> Result<Loaded, ClassifyError> {
        let ResolvedModel { model, labels } = self
            .resolver
            .resolve(&self.model_name)
            .map_err(ClassifyError::ModelLoad)?;

        let out_dim = model.num_labels();
        if out_dim != labels.len() {
            return Err(ClassifyError::ModelLoad(anyhow!(
                "model emits {out_dim} logits but its label set has {} entries",
                labels.len()
            )));
        }
        Ok(Loaded { model, labels })
    }

    /// Classify one text.
    ///
    /// Text beyond the model's maximum sequence length is truncated.
    pub fn infer(&self, text: &str) -> Result<PredictionResult, ClassifyError> {
        let loaded = self.loaded.get().ok_or(ClassifyError::NotLoaded)?;
        if text.is_empty() {
            return Err(ClassifyError::InvalidInput("text must not be empty".into()));
        }
        let mut results = run(loaded, &[text])?;
        results
            .pop()
            .ok_or_else(|| ClassifyError::Inference(anyhow!("model returned no output row")))
    }

    /// Classify several texts; results align with `texts`.
    ///
    /// Each result equals what [`infer`](Self::infer) returns for the same
    /// text. Inputs are sent in chunks of at most `batch_size`.
    pub fn infer_batch(&self, texts: &[&str]) -> Result<Vec<PredictionResult>, ClassifyError> {
        let loaded = self.loaded.get().ok_or(ClassifyError::NotLoaded)?;
        if texts.is_empty() {
            return Err(ClassifyError::InvalidInput("batch must not be empty".into()));
        }
        if let Some(idx) = texts.iter().position(|t| t.is_empty()) {
            return Err(ClassifyError::InvalidInput(format!(
                "text at index {idx} must not be empty"
            )));
        }

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            results.extend(run(loaded, chunk)?);
        }
        Ok(results)
    }

    /// Current state; safe to call before or during loading.
    pub fn info(&self) -> ModelInfo {
        match self.loaded.get() {
            Some(loaded) => ModelInfo {
                model_name: self.model_name.clone(),
                device: loaded.model.device().to_string(),
                model_loaded: true,
                num_labels: loaded.labels.len(),
                labels: Some(loaded.labels.clone()),
            },
            None => ModelInfo {
                model_name: self.model_name.clone(),
                device: self.device.to_string(),
                model_loaded: false,
                labels: None,
                num_labels: 0,
            },
        }
    }
}

fn run(loaded: &Loaded, texts: &[&str]) -> Result<Vec<PredictionResult>, ClassifyError> {
    let rows = loaded
        .model
        .logits(texts)
        .map_err(ClassifyError::Inference)?;
    if rows.len() != texts.len() {
        return Err(ClassifyError::Inference(anyhow!(
            "model returned {} rows for {} inputs",
            rows.len(),
            texts.len()
        )));
    }

    let num_labels = loaded.labels.len();
    rows.iter()
        .map(|row| {
            if row.len() != num_labels {
                return Err(ClassifyError::Inference(anyhow!(
                    "expected {num_labels} logits, got {}",
                    row.len()
                )));
            }
            Ok(PredictionResult::from_logits(row, &loaded.labels))
        })
        .collect()
}
