//! OCR backend: decodes uploaded bytes and runs the configured engine.
//!
//! Engines only produce raw lines; [`OcrBackend::extract`] owns the shared
//! contract (reading order, recomputed `text`/`average_confidence`, blank
//! images yielding an empty result rather than an error).

pub mod ctc;
pub mod db;
pub mod preprocess;

#[cfg(feature = "onnx")]
mod paddle;
#[cfg(feature = "tesseract")]
mod tesseract;

use std::io::Cursor;

use image::{DynamicImage, ImageReader};
use luatvn_core::{OcrEngineKind, OcrLine, OcrResult, Settings};
use tracing::{debug, info};

use crate::error::OcrError;

#[cfg(feature = "onnx")]
pub use paddle::PaddleEngine;
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractEngine;

/// A text recognition engine.
pub trait OcrEngine: Send + Sync {
    /// Engine tag reported in [`OcrResult::engine`].
    fn name(&self) -> &str;

    /// Recognize lines in a decoded image, in any order.
    fn recognize(&self, image: &DynamicImage) -> anyhow::Result<Vec<OcrLine>>;
}

pub struct OcrBackend {
    engine: Box<dyn OcrEngine>,
}

impl OcrBackend {
    pub fn new(engine: Box<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    /// Build the engine named in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, OcrError> {
        let engine: Box<dyn OcrEngine> = match settings.ocr_engine {
            OcrEngineKind::Tesseract => tesseract_engine(settings)?,
            OcrEngineKind::Paddle => paddle_engine(settings)?,
        };
        info!(engine = engine.name(), "OCR engine ready");
        Ok(Self::new(engine))
    }

    /// Decode `bytes` as an image and extract its text.
    pub fn extract(&self, bytes: &[u8]) -> Result<OcrResult, OcrError> {
        let image = decode_image(bytes)?;
        if image.width() == 0 || image.height() == 0 {
            return Ok(OcrResult::empty(self.engine.name()));
        }

        let lines = self.engine.recognize(&image).map_err(OcrError::Engine)?;
        let result = OcrResult::assemble(lines, self.engine.name());
        debug!(
            engine = self.engine.name(),
            lines = result.lines.len(),
            avg_conf = result.average_confidence,
            "OCR done"
        );
        Ok(result)
    }
}

#[cfg(feature = "onnx")]
fn paddle_engine(settings: &Settings) -> Result<Box<dyn OcrEngine>, OcrError> {
    let engine = PaddleEngine::load(&settings.ocr_model_dir).map_err(OcrError::Init)?;
    Ok(Box::new(engine))
}

#[cfg(not(feature = "onnx"))]
fn paddle_engine(_settings: &Settings) -> Result<Box<dyn OcrEngine>, OcrError> {
    Err(OcrError::Init(anyhow::anyhow!(
        "the paddle OCR engine requires the `onnx` feature"
    )))
}

#[cfg(feature = "tesseract")]
fn tesseract_engine(settings: &Settings) -> Result<Box<dyn OcrEngine>, OcrError> {
    let engine = TesseractEngine::new(settings.tessdata_dir.clone(), &settings.languages())
        .init()
        .map_err(OcrError::Init)?;
    Ok(Box::new(engine))
}

#[cfg(not(feature = "tesseract"))]
fn tesseract_engine(_settings: &Settings) -> Result<Box<dyn OcrEngine>, OcrError> {
    Err(OcrError::Init(anyhow::anyhow!(
        "the tesseract OCR engine requires the `tesseract` feature"
    )))
}

/// Sniff the format from content, never from a filename or declared type.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, OcrError> {
    if bytes.is_empty() {
        return Err(OcrError::InvalidImage("empty upload".into()));
    }
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| OcrError::InvalidImage(e.to_string()))?
        .decode()
        .map_err(|e| OcrError::InvalidImage(e.to_string()))
}
