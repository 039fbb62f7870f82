//! Static run parameters shared by every component.
//!
//! `Settings` carries no behaviour: the CLI fills it from flags and
//! environment variables, and each component reads the fields it needs.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Compute device for the classification model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(format!("unknown device {other:?} (expected cpu or cuda)")),
        }
    }
}

/// Which OCR engine backs `/ocr/*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    /// Deep-learning detector + recognizer (DB + CRNN on ONNX Runtime).
    #[default]
    #[serde(alias = "easyocr")]
    Paddle,
    /// The traditional Tesseract engine.
    Tesseract,
}

impl OcrEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paddle => "paddle",
            Self::Tesseract => "tesseract",
        }
    }
}

impl fmt::Display for OcrEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paddle" | "paddleocr" | "easyocr" => Ok(Self::Paddle),
            "tesseract" => Ok(Self::Tesseract),
            other => Err(format!(
                "unknown OCR engine {other:?} (expected paddle or tesseract)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Model
    pub model_name: String,
    pub model_cache_dir: PathBuf,
    pub device: Device,
    pub hub_endpoint: String,
    pub max_sequence_length: usize,
    pub batch_size: usize,

    // API
    pub api_host: String,
    pub api_port: u16,

    // Logging
    pub log_level: String,

    // OCR
    pub ocr_engine: OcrEngineKind,
    /// Comma-separated language codes, e.g. `vi,en`.
    pub ocr_languages: String,
    pub ocr_model_dir: PathBuf,
    /// Directory with `<lang>.traineddata`; searched in standard locations when unset.
    pub tessdata_dir: Option<PathBuf>,
    pub max_upload_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_name: "protonx-models/protonx-legal-tc".to_string(),
            model_cache_dir: PathBuf::from("./model_cache"),
            device: Device::Cpu,
            hub_endpoint: "https://huggingface.co".to_string(),
            max_sequence_length: 512,
            batch_size: 32,
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            log_level: "info".to_string(),
            ocr_engine: OcrEngineKind::Paddle,
            ocr_languages: "vi,en".to_string(),
            ocr_model_dir: PathBuf::from("./model_cache/paddleocr"),
            tessdata_dir: None,
            max_upload_size: 10 * 1024 * 1024,
        }
    }
}

impl Settings {
    /// `ocr_languages` split on commas, trimmed, empties removed.
    pub fn languages(&self) -> Vec<String> {
        self.ocr_languages
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}
