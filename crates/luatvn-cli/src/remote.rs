//! `luatvn client ...`: talk to a running server.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use luatvn_client::ApiClient;
use mime_guess::mime::Mime;

use crate::local::print_json;

#[derive(Debug, Subcommand)]
pub enum ClientAction {
    /// Service banner and model id.
    Root,
    /// Liveness and model readiness.
    Health,
    /// Loaded model, device, and labels.
    Info,
    /// Classify one or more texts.
    Predict {
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Upload an image for OCR.
    Ocr {
        image: PathBuf,
        /// Also classify the extracted text.
        #[arg(long)]
        classify: bool,
    },
}

pub async fn run(url: &str, action: ClientAction) -> anyhow::Result<()> {
    let client = ApiClient::new(url);
    match action {
        ClientAction::Root => print_json(&client.root().await?),
        ClientAction::Health => print_json(&client.health().await?),
        ClientAction::Info => print_json(&client.model_info().await?),
        ClientAction::Predict { texts } => {
            if let [text] = texts.as_slice() {
                print_json(&client.predict(text).await?)
            } else {
                let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
                print_json(&client.predict_batch(&texts).await?)
            }
        }
        ClientAction::Ocr { image, classify } => {
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("read {}", image.display()))?;
            let filename = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let mime = upload_mime(&image);
            let mime = mime.essence_str();
            if classify {
                print_json(&client.ocr_upload_and_classify(bytes, &filename, mime).await?)
            } else {
                print_json(&client.ocr_upload(bytes, &filename, mime).await?)
            }
        }
    }
}

/// Declared type of an upload, guessed from the extension. Unknown
/// extensions go out as `application/octet-stream` and the server rejects
/// them as non-images.
fn upload_mime(path: &Path) -> Mime {
    mime_guess::from_path(path).first_or_octet_stream()
}
