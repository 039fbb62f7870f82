use std::sync::Arc;

use luatvn_core::CombinedResult;
use tracing::{info, warn};

use crate::classifier::ClassificationBackend;
use crate::error::PipelineError;
use crate::ocr::OcrBackend;

/// OCR an image, then classify the text it contains.
#[derive(Clone)]
pub struct Pipeline {
    ocr: Arc<OcrBackend>,
    classifier: Arc<ClassificationBackend>,
}

impl Pipeline {
    pub fn new(ocr: Arc<OcrBackend>, classifier: Arc<ClassificationBackend>) -> Self {
        Self { ocr, classifier }
    }

    /// Images with no text skip classification and yield `classification: None`.
    /// A classification failure still hands back the OCR result.
    pub fn process(&self, bytes: &[u8]) -> Result<CombinedResult, PipelineError> {
        let ocr_result = self.ocr.extract(bytes)?;

        if ocr_result.is_blank() {
            info!(engine = %ocr_result.engine, "no text found; skipping classification");
            return Ok(CombinedResult {
                ocr_result,
                classification: None,
            });
        }

        match self.classifier.infer(&ocr_result.text) {
            Ok(prediction) => Ok(CombinedResult {
                ocr_result,
                classification: Some(prediction),
            }),
            Err(source) => {
                warn!(error = %source, "classification of OCR text failed");
                Err(PipelineError::Classification {
                    ocr_result: Box::new(ocr_result),
                    source,
                })
            }
        }
    }
}
