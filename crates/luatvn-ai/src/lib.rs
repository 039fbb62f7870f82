//! Inference core: load-once sequence classification, pluggable OCR engines,
//! and the OCR → classification pipeline.

mod classifier;
mod error;
pub mod ocr;
mod pipeline;

pub use classifier::{ArtifactResolver, ClassificationBackend, ResolvedModel, SequenceClassifier};
pub use error::{ClassifyError, OcrError, PipelineError};
pub use ocr::{OcrBackend, OcrEngine};
pub use pipeline::Pipeline;

#[cfg(feature = "onnx")]
mod resolver;
#[cfg(feature = "onnx")]
mod sequence;
#[cfg(feature = "onnx")]
pub use ocr::PaddleEngine;
#[cfg(feature = "onnx")]
pub use resolver::{HubResolver, LocalResolver};
#[cfg(feature = "tesseract")]
pub use ocr::TesseractEngine;
#[cfg(feature = "onnx")]
pub use sequence::OnnxClassifier;
