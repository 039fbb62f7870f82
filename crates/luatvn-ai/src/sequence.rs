//! ONNX Runtime sequence classifier for Transformers checkpoints.
//!
//! Expects a model exported with a `logits` output of shape
//! `[batch, num_labels]` and a Hugging Face `tokenizer.json`.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::Context;
use luatvn_core::Device;
use ort::session::Session;
use ort::session::builder::SessionBuilder;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use crate::classifier::SequenceClassifier;

/// Tokenizer + sequence-classification session.
///
/// `Session::run` needs exclusive access, so the session sits behind a mutex;
/// the tokenizer is shared freely.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    num_labels: usize,
    uses_token_type_ids: bool,
    device: Device,
}

impl OnnxClassifier {
    /// Load `model.onnx` and `tokenizer.json`, truncating inputs to `max_length` tokens.
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
        device: Device,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(model_path.exists(), "{model_path:?} not found");
        anyhow::ensure!(tokenizer_path.exists(), "{tokenizer_path:?} not found");

        let (builder, device) = with_device(Session::builder()?, device)?;
        let session = builder
            .commit_from_file(model_path)
            .with_context(|| format!("create ONNX session from {model_path:?}"))?;

        let num_labels = infer_num_labels(session.outputs()[0].dtype())
            .context("cannot determine number of labels from model output shape")?;
        let uses_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;

        // Over-long legal documents are truncated rather than rejected.
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        // Pad each batch to its longest member; the attention mask hides the padding.
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            ..Default::default()
        }));

        info!(
            num_labels,
            max_length,
            %device,
            model = %model_path.display(),
            "loaded sequence classification model"
        );
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            num_labels,
            uses_token_type_ids,
            device,
        })
    }
}

impl SequenceClassifier for OnnxClassifier {
    fn num_labels(&self) -> usize {
        self.num_labels
    }

    fn device(&self) -> Device {
        self.device
    }

    fn logits(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        // Flat input tensors: [batch_size, seq_len].
        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + j] = mask as i64;
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[offset + j] = tid as i64;
            }
        }

        let shape = [batch_size as i64, seq_len as i64];
        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.into_boxed_slice()))?;

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = if self.uses_token_type_ids {
            let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])?
        } else {
            // RoBERTa-family checkpoints (PhoBERT, XLM-R) take no segment ids.
            session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])?
        };

        // Logits: [batch_size, num_labels].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 2 && dims[0] as usize == batch_size && dims[1] as usize == self.num_labels,
            "unexpected output shape: {dims:?}, expected [{batch_size}, {}]",
            self.num_labels
        );

        Ok(output_data
            .chunks(self.num_labels)
            .map(<[f32]>::to_vec)
            .collect())
    }
}

#[cfg(feature = "cuda")]
fn with_device(builder: SessionBuilder, device: Device) -> anyhow::Result<(SessionBuilder, Device)> {
    match device {
        Device::Cuda => {
            let builder = builder.with_execution_providers([
                ort::execution_providers::CUDAExecutionProvider::default().build(),
            ])?;
            Ok((builder, Device::Cuda))
        }
        Device::Cpu => Ok((builder, Device::Cpu)),
    }
}

#[cfg(not(feature = "cuda"))]
fn with_device(builder: SessionBuilder, device: Device) -> anyhow::Result<(SessionBuilder, Device)> {
    if device == Device::Cuda {
        tracing::warn!("built without the `cuda` feature; running on CPU");
    }
    Ok((builder, Device::Cpu))
}

/// Number of classes from the output type's last dimension.
fn infer_num_labels(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn model_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("model_cache")
            .join("protonx-models--protonx-legal-tc")
    }

    /// The exported checkpoint is not part of the repository; skip when absent.
    fn load_or_skip() -> Option<OnnxClassifier> {
        let dir = model_dir();
        if !dir.join("model.onnx").exists() {
            eprintln!("skipping: no model at {}", dir.display());
            return None;
        }
        Some(
            OnnxClassifier::load(
                &dir.join("model.onnx"),
                &dir.join("tokenizer.json"),
                512,
                Device::Cpu,
            )
            .unwrap(),
        )
    }

    #[test]
    fn logits_have_one_row_per_text() {
        let Some(clf) = load_or_skip() else { return };
        let rows = clf
            .logits(&["Điều 1. Phạm vi điều chỉnh", "Hợp đồng mua bán nhà đất"])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == clf.num_labels()));
    }

    #[test]
    fn padding_does_not_change_logits() {
        let Some(clf) = load_or_skip() else { return };
        let short = "Luật Đất đai";
        let long = "Điều 1. Phạm vi điều chỉnh. Luật này quy định về chế độ sở hữu đất đai, \
                    quyền hạn và trách nhiệm của Nhà nước đại diện chủ sở hữu toàn dân về đất đai.";

        let alone = clf.logits(&[short]).unwrap().remove(0);
        let padded = clf.logits(&[short, long]).unwrap().remove(0);
        for (a, b) in alone.iter().zip(&padded) {
            assert!((a - b).abs() < 1e-3, "{alone:?} vs {padded:?}");
        }
    }

    #[test]
    fn overlong_text_is_truncated() {
        let Some(clf) = load_or_skip() else { return };
        let text = "Điều khoản thi hành. ".repeat(2_000);
        let rows = clf.logits(&[&text]).unwrap();
        assert_eq!(rows[0].len(), clf.num_labels());
    }

    #[test]
    fn empty_batch() {
        let Some(clf) = load_or_skip() else { return };
        assert!(clf.logits(&[]).unwrap().is_empty());
    }
}
