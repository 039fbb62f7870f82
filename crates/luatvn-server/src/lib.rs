//! HTTP service for legal-text classification and OCR.
//!
//! Handlers validate requests, hand work to the blocking pool, and map
//! backend errors to status codes. The model loads in the background after
//! the listener is up, so `/health` answers from the first moment.

mod error;
mod handlers;
mod models;
mod state;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use luatvn_ai::ClassificationBackend;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use error::{ApiError, FieldError};
pub use models::{BatchPredictionResponse, HealthResponse, RootResponse};
pub use state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_size.saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/model-info", get(handlers::model_info))
        .route("/predict", post(handlers::predict))
        .route("/predict/batch", post(handlers::predict_batch))
        .route("/ocr/upload", post(handlers::ocr_upload))
        .route("/ocr/upload-and-classify", post(handlers::ocr_upload_and_classify))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Load the model on the blocking pool. Failure is logged and leaves the
/// service up with `model_loaded: false`.
pub fn spawn_background_load(classifier: Arc<ClassificationBackend>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        if let Err(err) = classifier.load() {
            warn!(error = %err, "serving without a model; prediction endpoints return 503");
        }
    })
}

/// Bind `addr`, start the background model load, and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    spawn_background_load(Arc::clone(&state.classifier));

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use luatvn_ai::{ArtifactResolver, OcrBackend, OcrEngine, ResolvedModel, SequenceClassifier};
    use luatvn_core::{BBox, Device, LabelSet, OcrLine};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const LABELS: [&str; 3] = ["Hiến pháp", "Luật", "Nghị định"];

    struct FakeModel {
        calls: Arc<AtomicUsize>,
    }

    impl SequenceClassifier for FakeModel {
        fn num_labels(&self) -> usize {
            3
        }
        fn logits(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![(t.chars().count() % 4) as f32, 1.5, 0.25])
                .collect())
        }
    }

    struct FakeResolver {
        calls: Arc<AtomicUsize>,
    }

    impl ArtifactResolver for FakeResolver {
        fn resolve(&self, _model_id: &str) -> anyhow::Result<ResolvedModel> {
            Ok(ResolvedModel {
                model: Box::new(FakeModel {
                    calls: Arc::clone(&self.calls),
                }),
                labels: LabelSet::new(LABELS.iter().map(|s| s.to_string()).collect())?,
            })
        }
    }

    struct FakeEngine {
        calls: Arc<AtomicUsize>,
    }

    impl OcrEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }
        fn recognize(&self, _image: &DynamicImage) -> anyhow::Result<Vec<OcrLine>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                OcrLine {
                    text: "Điều 1".into(),
                    confidence: 0.7,
                    bbox: BBox::new(10, 40, 80, 55),
                },
                OcrLine {
                    text: "LUẬT ĐẤT ĐAI".into(),
                    confidence: 0.9,
                    bbox: BBox::new(30, 5, 200, 25),
                },
            ])
        }
    }

    struct Harness {
        state: AppState,
        model_calls: Arc<AtomicUsize>,
        ocr_calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new(loaded: bool, with_ocr: bool) -> Self {
            let model_calls = Arc::new(AtomicUsize::new(0));
            let ocr_calls = Arc::new(AtomicUsize::new(0));
            let classifier = ClassificationBackend::new(
                "test/legal-tc",
                Device::Cpu,
                Arc::new(FakeResolver {
                    calls: Arc::clone(&model_calls),
                }),
            );
            if loaded {
                classifier.load().unwrap();
            }
            let ocr = with_ocr.then(|| {
                Arc::new(OcrBackend::new(Box::new(FakeEngine {
                    calls: Arc::clone(&ocr_calls),
                })))
            });
            Self {
                state: AppState::new(Arc::new(classifier), ocr, 1024 * 1024),
                model_calls,
                ocr_calls,
            }
        }

        async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
            let resp = router(self.state.clone()).oneshot(req).await.unwrap();
            let status = resp.status();
            let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.send(Request::get(uri).body(Body::empty()).unwrap()).await
        }

        async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.send(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn upload(&self, uri: &str, content_type: &str, data: &[u8]) -> (StatusCode, Value) {
            let boundary = "luatvn-test-boundary";
            let mut body = format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"scan.png\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .into_bytes();
            body.extend_from_slice(data);
            body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

            self.send(
                Request::post(uri)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
        }
    }

    fn png() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn root_names_the_model() {
        let h = Harness::new(false, false);
        let (status, body) = h.get("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "test/legal-tc");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn health_and_info_before_load() {
        let h = Harness::new(false, false);
        let (status, body) = h.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "healthy", "model_loaded": false}));

        let (_, info) = h.get("/model-info").await;
        assert_eq!(info["model_loaded"], false);
        assert_eq!(info["labels"], json!({}));
        assert_eq!(info["num_labels"], 0);
    }

    #[tokio::test]
    async fn background_load_flips_health() {
        let h = Harness::new(false, false);
        spawn_background_load(Arc::clone(&h.state.classifier))
            .await
            .unwrap();
        let (_, body) = h.get("/health").await;
        assert_eq!(body["model_loaded"], true);
        let (_, info) = h.get("/model-info").await;
        assert_eq!(info["num_labels"], 3);
        assert_eq!(info["labels"]["1"], "Luật");
    }

    #[tokio::test]
    async fn predict_before_load_is_503() {
        let h = Harness::new(false, false);
        let (status, body) = h.post_json("/predict", json!({"text": "Điều 1"})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_inference() {
        let h = Harness::new(true, false);
        let (status, body) = h.post_json("/predict", json!({"text": ""})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["loc"], json!(["body", "text"]));
        assert_eq!(h.model_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn whitespace_text_is_classified() {
        let h = Harness::new(true, false);
        let (status, body) = h.post_json("/predict", json!({"text": "   "})).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["predicted_label"].is_string());

        let (status, body) = h
            .post_json("/predict/batch", json!({"texts": ["Luật", " \n"]}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["predictions"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn malformed_json_is_422() {
        let h = Harness::new(true, false);
        let (status, body) = h.post_json("/predict", json!({"txt": "x"})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_array());
        assert_eq!(h.model_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn prediction_is_self_consistent() {
        let h = Harness::new(true, false);
        let (status, body) = h
            .post_json("/predict", json!({"text": "Nghị định số 15/2020"}))
            .await;
        assert_eq!(status, StatusCode::OK);

        let class = body["predicted_class"].as_u64().unwrap() as usize;
        assert_eq!(body["predicted_label"], LABELS[class]);

        let scores: Vec<f64> = body["all_scores"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert!((scores.iter().sum::<f64>() - 1.0).abs() < 1e-4);
        assert_eq!(body["confidence"].as_f64().unwrap(), scores[class]);

        let keys: Vec<&str> = body["all_labels"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, LABELS);
    }

    #[tokio::test]
    async fn batch_preserves_order_and_matches_single() {
        let h = Harness::new(true, false);
        let texts = ["a", "ab", "abc", "abcd"];
        let (status, body) = h.post_json("/predict/batch", json!({"texts": texts})).await;
        assert_eq!(status, StatusCode::OK);
        let predictions = body["predictions"].as_array().unwrap();
        assert_eq!(predictions.len(), texts.len());

        for (text, batched) in texts.iter().zip(predictions) {
            let (_, single) = h.post_json("/predict", json!({"text": text})).await;
            assert_eq!(&single, batched, "{text}");
        }
    }

    #[tokio::test]
    async fn batch_validation_points_at_items() {
        let h = Harness::new(true, false);
        let (status, body) = h.post_json("/predict/batch", json!({"texts": []})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["loc"], json!(["body", "texts"]));

        let (status, body) = h
            .post_json("/predict/batch", json!({"texts": ["Luật", "", "Nghị định"]}))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["loc"], json!(["body", "texts", 1]));
        assert_eq!(h.model_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ocr_upload_returns_reading_order() {
        let h = Harness::new(false, true);
        let (status, body) = h.upload("/ocr/upload", "image/png", &png()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "LUẬT ĐẤT ĐAI Điều 1");
        assert_eq!(body["engine"], "fake");
        assert_eq!(body["lines"][0]["bbox"], json!([30, 5, 200, 25]));
        assert!((body["average_confidence"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected_before_ocr() {
        let h = Harness::new(true, true);
        let (status, body) = h.upload("/ocr/upload", "application/pdf", b"%PDF-1.7").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["loc"], json!(["body", "file"]));

        let (status, _) = h.upload("/ocr/upload", "image/png", b"not really a png").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(h.ocr_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversize_upload_is_422() {
        let h = Harness::new(true, true);
        let big = vec![0u8; 1024 * 1024 + 1];
        let (status, body) = h.upload("/ocr/upload", "image/png", &big).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["type"], "value_error.file_too_large");
    }

    #[tokio::test]
    async fn missing_ocr_engine_is_503() {
        let h = Harness::new(true, false);
        let (status, _) = h.upload("/ocr/upload", "image/png", &png()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = h
            .upload("/ocr/upload-and-classify", "image/png", &png())
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn upload_and_classify() {
        let h = Harness::new(true, true);
        let (status, body) = h
            .upload("/ocr/upload-and-classify", "image/jpeg", &png())
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ocr_result"]["text"], "LUẬT ĐẤT ĐAI Điều 1");
        let class = body["classification"]["predicted_class"].as_u64().unwrap() as usize;
        assert_eq!(body["classification"]["predicted_label"], LABELS[class]);
    }

    #[tokio::test]
    async fn unloaded_model_keeps_ocr_payload() {
        let h = Harness::new(false, true);
        let (status, body) = h
            .upload("/ocr/upload-and-classify", "image/png", &png())
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"]["stage"], "classification");
        assert_eq!(body["detail"]["ocr_result"]["text"], "LUẬT ĐẤT ĐAI Điều 1");
    }
}
