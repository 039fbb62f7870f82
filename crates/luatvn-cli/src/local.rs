//! In-process inference: building the backends and the `predict`/`ocr` commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use luatvn_ai::{
    ArtifactResolver, ClassificationBackend, HubResolver, LocalResolver, OcrBackend, Pipeline,
    PipelineError,
};
use luatvn_core::Settings;
use serde::Serialize;

pub fn classification_backend(settings: &Settings, offline: bool) -> ClassificationBackend {
    let local = LocalResolver::new(
        settings.model_cache_dir.clone(),
        settings.max_sequence_length,
        settings.device,
    );
    let resolver: Arc<dyn ArtifactResolver> = if offline {
        Arc::new(local)
    } else {
        Arc::new(HubResolver::new(settings.hub_endpoint.clone(), local))
    };
    ClassificationBackend::new(settings.model_name.clone(), settings.device, resolver)
        .with_batch_size(settings.batch_size)
}

pub fn predict(settings: &Settings, offline: bool, texts: &[String]) -> anyhow::Result<()> {
    let backend = classification_backend(settings, offline);
    backend.load()?;

    let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
    if let [text] = texts.as_slice() {
        print_json(&backend.infer(text)?)
    } else {
        print_json(&backend.infer_batch(&texts)?)
    }
}

pub fn ocr(settings: &Settings, offline: bool, image: &Path, classify: bool) -> anyhow::Result<()> {
    let bytes = std::fs::read(image).with_context(|| format!("read {}", image.display()))?;
    let ocr = Arc::new(OcrBackend::from_settings(settings)?);

    if !classify {
        return print_json(&ocr.extract(&bytes)?);
    }

    let classifier = Arc::new(classification_backend(settings, offline));
    // A model that fails to load surfaces below as a classification failure.
    if let Err(err) = classifier.load() {
        tracing::warn!(error = %err, "model unavailable");
    }
    match Pipeline::new(ocr, classifier).process(&bytes) {
        Ok(combined) => print_json(&combined),
        Err(PipelineError::Classification { ocr_result, source }) => {
            print_json(&ocr_result)?;
            Err(anyhow::Error::new(source).context("OCR succeeded but classification failed"))
        }
        Err(err) => Err(err.into()),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
