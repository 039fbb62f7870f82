use luatvn_core::OcrResult;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("model not loaded")]
    NotLoaded,

    #[error("model load failed: {0:#}")]
    ModelLoad(anyhow::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("OCR engine initialization failed: {0:#}")]
    Init(anyhow::Error),

    #[error("OCR engine failed: {0:#}")]
    Engine(anyhow::Error),
}

/// Failure of the OCR → classification pipeline, naming the leg that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ocr(#[from] OcrError),

    /// OCR finished; classifying its text did not.
    #[error("OCR succeeded but classification failed: {source}")]
    Classification {
        ocr_result: Box<OcrResult>,
        source: ClassifyError,
    },
}
