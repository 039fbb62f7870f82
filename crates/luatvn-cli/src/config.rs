//! Flags and environment variables → [`Settings`].
//!
//! Every flag is optional; anything not given falls back to the
//! `Settings` default.

use std::path::PathBuf;

use clap::Args;
use luatvn_core::{Device, OcrEngineKind, Settings};

#[derive(Debug, Default, Args)]
pub struct SettingsArgs {
    /// Hub id (`org/name`) or local directory of the classification model.
    #[arg(long, env = "MODEL_NAME", global = true)]
    pub model_name: Option<String>,

    #[arg(long, env = "MODEL_CACHE_DIR", global = true)]
    pub model_cache_dir: Option<PathBuf>,

    /// `cpu` or `cuda`.
    #[arg(long, env = "DEVICE", global = true)]
    pub device: Option<Device>,

    #[arg(long, env = "HUB_ENDPOINT", global = true)]
    pub hub_endpoint: Option<String>,

    /// Only use models already in the cache.
    #[arg(long, env = "LUATVN_OFFLINE", global = true)]
    pub offline: bool,

    #[arg(long, env = "MAX_SEQUENCE_LENGTH", global = true)]
    pub max_sequence_length: Option<usize>,

    #[arg(long, env = "BATCH_SIZE", global = true)]
    pub batch_size: Option<usize>,

    #[arg(long, env = "API_HOST", global = true)]
    pub api_host: Option<String>,

    #[arg(long, env = "API_PORT", global = true)]
    pub api_port: Option<u16>,

    /// Default log filter; `RUST_LOG` takes precedence.
    #[arg(long, env = "LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// `paddle` or `tesseract`.
    #[arg(long, env = "OCR_ENGINE", global = true)]
    pub ocr_engine: Option<OcrEngineKind>,

    /// Comma-separated, e.g. `vi,en`.
    #[arg(long, env = "OCR_LANGUAGES", global = true)]
    pub ocr_languages: Option<String>,

    #[arg(long, env = "OCR_MODEL_DIR", global = true)]
    pub ocr_model_dir: Option<PathBuf>,

    /// Directory holding `<lang>.traineddata` files.
    #[arg(long, env = "TESSDATA_PREFIX", global = true)]
    pub tessdata_dir: Option<PathBuf>,

    /// Upload ceiling in bytes.
    #[arg(long, env = "MAX_UPLOAD_SIZE", global = true)]
    pub max_upload_size: Option<usize>,
}

impl SettingsArgs {
    pub fn into_settings(self) -> Settings {
        let mut s = Settings::default();
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field { s.$field = v; })*
            };
        }
        set!(
            model_name,
            model_cache_dir,
            device,
            hub_endpoint,
            max_sequence_length,
            batch_size,
            api_host,
            api_port,
            log_level,
            ocr_engine,
            ocr_languages,
            ocr_model_dir,
            max_upload_size,
        );
        if self.tessdata_dir.is_some() {
            s.tessdata_dir = self.tessdata_dir;
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_flags_keep_defaults() {
        let s = SettingsArgs::default().into_settings();
        let d = Settings::default();
        assert_eq!(s.model_name, d.model_name);
        assert_eq!(s.api_port, d.api_port);
        assert_eq!(s.ocr_engine, d.ocr_engine);
    }

    #[test]
    fn flags_override_defaults() {
        let args = SettingsArgs {
            device: Some(Device::Cuda),
            api_port: Some(9001),
            ocr_engine: Some(OcrEngineKind::Tesseract),
            ocr_languages: Some("vi".into()),
            tessdata_dir: Some("/opt/tessdata".into()),
            ..SettingsArgs::default()
        };
        let s = args.into_settings();
        assert_eq!(s.device, Device::Cuda);
        assert_eq!(s.bind_addr(), "0.0.0.0:9001");
        assert_eq!(s.ocr_engine, OcrEngineKind::Tesseract);
        assert_eq!(s.languages(), vec!["vi"]);
        assert_eq!(s.tessdata_dir, Some(PathBuf::from("/opt/tessdata")));
    }
}
