use std::sync::Arc;

use luatvn_ai::{ClassificationBackend, OcrBackend, Pipeline};

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<ClassificationBackend>,
    /// `None` when the OCR engine failed to initialize.
    pub ocr: Option<Arc<OcrBackend>>,
    pub max_upload_size: usize,
}

impl AppState {
    pub fn new(
        classifier: Arc<ClassificationBackend>,
        ocr: Option<Arc<OcrBackend>>,
        max_upload_size: usize,
    ) -> Self {
        Self {
            classifier,
            ocr,
            max_upload_size,
        }
    }

    pub fn pipeline(&self) -> Option<Pipeline> {
        self.ocr
            .as_ref()
            .map(|ocr| Pipeline::new(Arc::clone(ocr), Arc::clone(&self.classifier)))
    }
}
