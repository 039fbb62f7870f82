//! Core types shared by the classification, OCR, and service layers.

pub mod config;
pub mod info;
pub mod labels;
pub mod ocr;
pub mod prediction;

pub use config::{Device, OcrEngineKind, Settings};
pub use info::ModelInfo;
pub use labels::{LabelError, LabelSet};
pub use ocr::{BBox, CombinedResult, OcrLine, OcrResult};
pub use prediction::{PredictionResult, softmax, stable_argmax};
