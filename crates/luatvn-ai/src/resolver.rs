//! Artifact resolution: model identifier → loaded ONNX classifier + labels.
//!
//! A model directory holds `model.onnx`, `tokenizer.json`, and optionally the
//! Transformers `config.json` carrying `id2label`. [`LocalResolver`] reads
//! such a directory from the cache; [`HubResolver`] first downloads missing
//! files from a Hugging Face-compatible hub into that cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use luatvn_core::{Device, LabelSet};
use tracing::{info, warn};

use crate::classifier::{ArtifactResolver, ResolvedModel, SequenceClassifier};
use crate::sequence::OnnxClassifier;

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";
const CONFIG_FILE: &str = "config.json";

/// Cache directory name for a hub id: `org/name` → `org--name`.
pub fn cache_dir_name(model_id: &str) -> String {
    model_id.trim_matches('/').replace('/', "--")
}

/// Resolves models from a local cache directory.
#[derive(Debug, Clone)]
pub struct LocalResolver {
    cache_dir: PathBuf,
    max_length: usize,
    device: Device,
}

impl LocalResolver {
    pub fn new(cache_dir: impl Into<PathBuf>, max_length: usize, device: Device) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            max_length,
            device,
        }
    }

    /// Directory a model id resolves to.
    ///
    /// An id that is itself an existing directory is used as-is.
    pub fn model_dir(&self, model_id: &str) -> PathBuf {
        let direct = Path::new(model_id);
        if direct.is_dir() {
            direct.to_path_buf()
        } else {
            self.cache_dir.join(cache_dir_name(model_id))
        }
    }

    fn load_dir(&self, dir: &Path) -> anyhow::Result<ResolvedModel> {
        let model = OnnxClassifier::load(
            &dir.join(MODEL_FILE),
            &dir.join(TOKENIZER_FILE),
            self.max_length,
            self.device,
        )?;

        let config_path = dir.join(CONFIG_FILE);
        let labels = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path)
                .with_context(|| format!("read {config_path:?}"))?;
            LabelSet::from_model_config(&raw)?
        } else {
            None
        };
        let labels = match labels {
            Some(labels) => labels,
            None => {
                warn!(dir = %dir.display(), "no id2label in model config; using placeholder labels");
                LabelSet::placeholder(model.num_labels())?
            }
        };

        Ok(ResolvedModel {
            model: Box::new(model),
            labels,
        })
    }
}

impl ArtifactResolver for LocalResolver {
    fn resolve(&self, model_id: &str) -> anyhow::Result<ResolvedModel> {
        let dir = self.model_dir(model_id);
        anyhow::ensure!(
            dir.is_dir(),
            "model {model_id:?} not found in cache ({})",
            dir.display()
        );
        self.load_dir(&dir)
    }
}

/// Downloads missing artifacts into the cache, then loads them locally.
#[derive(Debug, Clone)]
pub struct HubResolver {
    endpoint: String,
    local: LocalResolver,
}

impl HubResolver {
    /// `endpoint` is like `https://huggingface.co` (no trailing slash needed).
    pub fn new(endpoint: impl Into<String>, local: LocalResolver) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            local,
        }
    }

    fn file_url(&self, model_id: &str, remote_path: &str) -> String {
        format!(
            "{}/{}/resolve/main/{remote_path}",
            self.endpoint,
            model_id.trim_matches('/')
        )
    }

    /// Fetch `remote_paths` in order until one succeeds, storing it as `dest`.
    ///
    /// Returns `Ok(false)` when every candidate is missing upstream.
    fn fetch(
        &self,
        client: &reqwest::blocking::Client,
        model_id: &str,
        remote_paths: &[&str],
        dest: &Path,
    ) -> anyhow::Result<bool> {
        if dest.exists() {
            return Ok(true);
        }
        let dir = dest.parent().context("destination has no parent directory")?;

        for remote in remote_paths {
            let url = self.file_url(model_id, remote);
            info!(url = %url, "downloading model artifact");
            let resp = client
                .get(&url)
                .send()
                .with_context(|| format!("request {url}"))?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            let mut resp = resp.error_for_status()?;

            // Partial downloads never land at `dest`: the temp file is removed on drop.
            let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
            let bytes = resp
                .copy_to(tmp.as_file_mut())
                .with_context(|| format!("download {url}"))?;
            tmp.as_file_mut().sync_all()?;
            tmp.persist(dest)
                .with_context(|| format!("move download to {dest:?}"))?;
            info!(bytes, dest = %dest.display(), "artifact cached");
            return Ok(true);
        }
        Ok(false)
    }
}

impl ArtifactResolver for HubResolver {
    fn resolve(&self, model_id: &str) -> anyhow::Result<ResolvedModel> {
        let dir = self.local.model_dir(model_id);
        std::fs::create_dir_all(&dir).with_context(|| format!("create {dir:?}"))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("create HTTP client")?;

        let found = self.fetch(
            &client,
            model_id,
            &["onnx/model.onnx", MODEL_FILE],
            &dir.join(MODEL_FILE),
        )?;
        anyhow::ensure!(found, "{model_id:?} has no ONNX export on {}", self.endpoint);

        let found = self.fetch(&client, model_id, &[TOKENIZER_FILE], &dir.join(TOKENIZER_FILE))?;
        anyhow::ensure!(found, "{model_id:?} has no {TOKENIZER_FILE} on {}", self.endpoint);

        if !self.fetch(&client, model_id, &[CONFIG_FILE], &dir.join(CONFIG_FILE))? {
            warn!(model = model_id, "no config.json upstream");
        }

        self.local.load_dir(&dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_dir_name_flattens_org() {
        assert_eq!(
            cache_dir_name("protonx-models/protonx-legal-tc"),
            "protonx-models--protonx-legal-tc"
        );
        assert_eq!(cache_dir_name("/local-model/"), "local-model");
    }

    #[test]
    fn model_dir_prefers_existing_path() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = LocalResolver::new("/nonexistent-cache", 512, Device::Cpu);

        let direct = tmp.path().to_str().unwrap();
        assert_eq!(resolver.model_dir(direct), tmp.path());
        assert_eq!(
            resolver.model_dir("org/name"),
            PathBuf::from("/nonexistent-cache/org--name")
        );
    }

    #[test]
    fn missing_model_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = LocalResolver::new(tmp.path(), 512, Device::Cpu);
        let err = resolver.resolve("org/absent").err().unwrap();
        assert!(err.to_string().contains("not found"), "{err}");
    }

    #[test]
    fn incomplete_model_dir_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("org--partial");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(TOKENIZER_FILE), "{}").unwrap();

        let resolver = LocalResolver::new(tmp.path(), 512, Device::Cpu);
        assert!(resolver.resolve("org/partial").is_err());
    }

    #[test]
    fn hub_urls() {
        let hub = HubResolver::new(
            "https://huggingface.co/",
            LocalResolver::new("/tmp", 512, Device::Cpu),
        );
        assert_eq!(
            hub.file_url("protonx-models/protonx-legal-tc", "onnx/model.onnx"),
            "https://huggingface.co/protonx-models/protonx-legal-tc/resolve/main/onnx/model.onnx"
        );
    }
}
