mod config;
mod local;
mod remote;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use luatvn_ai::OcrBackend;
use luatvn_core::Settings;
use luatvn_server::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::SettingsArgs;
use crate::remote::ClientAction;

#[derive(Debug, Parser)]
#[command(name = "luatvn", version)]
#[command(about = "Vietnamese legal-document classification and OCR")]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve,
    /// Classify text with the local model and print JSON.
    Predict {
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// OCR an image with the configured engine and print JSON.
    Ocr {
        image: PathBuf,
        /// Also classify the extracted text.
        #[arg(long)]
        classify: bool,
    },
    /// Call a running server.
    Client {
        #[arg(long, env = "LUATVN_URL", default_value = "http://localhost:8000")]
        url: String,
        #[command(subcommand)]
        action: ClientAction,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let offline = cli.settings.offline;
    let settings = cli.settings.into_settings();

    init_logging(&settings.log_level);
    info!("luatvn v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve => runtime()?.block_on(serve(settings, offline)),
        Command::Predict { texts } => local::predict(&settings, offline, &texts),
        Command::Ocr { image, classify } => local::ocr(&settings, offline, &image, classify),
        Command::Client { url, action } => runtime()?.block_on(remote::run(&url, action)),
    }
}

/// Logs go to stderr so JSON on stdout stays clean.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

async fn serve(settings: Settings, offline: bool) -> anyhow::Result<()> {
    let classifier = Arc::new(local::classification_backend(&settings, offline));

    // Engine setup loads ONNX sessions or Tesseract language data.
    let ocr_settings = settings.clone();
    let ocr = match tokio::task::spawn_blocking(move || OcrBackend::from_settings(&ocr_settings)).await? {
        Ok(backend) => Some(Arc::new(backend)),
        Err(err) => {
            warn!(engine = %settings.ocr_engine, error = %err, "OCR disabled; /ocr endpoints return 503");
            None
        }
    };

    let state = AppState::new(classifier, ocr, settings.max_upload_size);
    luatvn_server::serve(state, &settings.bind_addr()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "luatvn",
            "predict",
            "Điều 1",
            "Điều 2",
            "--model-name",
            "org/other",
            "--batch-size",
            "4",
        ])
        .unwrap();
        let Command::Predict { texts } = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(texts, ["Điều 1", "Điều 2"]);
        let s = cli.settings.into_settings();
        assert_eq!(s.model_name, "org/other");
        assert_eq!(s.batch_size, 4);
    }

    #[test]
    fn client_subcommand_parses() {
        let cli = Cli::try_parse_from([
            "luatvn",
            "client",
            "--url",
            "http://10.0.0.2:8000",
            "ocr",
            "scan.jpg",
            "--classify",
        ])
        .unwrap();
        match cli.command {
            Command::Client {
                url,
                action: ClientAction::Ocr { image, classify },
            } => {
                assert_eq!(url, "http://10.0.0.2:8000");
                assert_eq!(image, PathBuf::from("scan.jpg"));
                assert!(classify);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_engine_is_rejected() {
        assert!(Cli::try_parse_from(["luatvn", "--ocr-engine", "abbyy", "serve"]).is_err());
    }
}
