//! Async HTTP client for the classification and OCR endpoints.

use luatvn_core::{CombinedResult, ModelInfo, OcrResult, PredictionResult};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::{Health, ServiceInfo};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-2xx response; `detail` is the body's `detail` field when present.
    #[error("server returned {status}: {detail}")]
    Server { status: u16, detail: Value },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct BatchResponse {
    predictions: Vec<PredictionResult>,
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` should be like `http://localhost:8000` (trailing slash is trimmed).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn root(&self) -> Result<ServiceInfo, ClientError> {
        self.get("/").await
    }

    pub async fn health(&self) -> Result<Health, ClientError> {
        self.get("/health").await
    }

    pub async fn model_info(&self) -> Result<ModelInfo, ClientError> {
        self.get("/model-info").await
    }

    pub async fn predict(&self, text: &str) -> Result<PredictionResult, ClientError> {
        let url = self.url("/predict");
        debug!(url = %url, chars = text.chars().count(), "predict");
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn predict_batch(&self, texts: &[&str]) -> Result<Vec<PredictionResult>, ClientError> {
        let url = self.url("/predict/batch");
        info!(url = %url, count = texts.len(), "batch predict");
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "texts": texts }))
            .send()
            .await?;
        let batch: BatchResponse = decode(resp).await?;
        Ok(batch.predictions)
    }

    /// Upload an image for OCR. `mime` must be an `image/*` type.
    pub async fn ocr_upload(
        &self,
        image: Vec<u8>,
        filename: &str,
        mime: &str,
    ) -> Result<OcrResult, ClientError> {
        self.upload("/ocr/upload", image, filename, mime).await
    }

    pub async fn ocr_upload_and_classify(
        &self,
        image: Vec<u8>,
        filename: &str,
        mime: &str,
    ) -> Result<CombinedResult, ClientError> {
        self.upload("/ocr/upload-and-classify", image, filename, mime)
            .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let resp = self.client.get(&url).send().await?;
        decode(resp).await
    }

    async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        image: Vec<u8>,
        filename: &str,
        mime: &str,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        info!(url = %url, bytes = image.len(), filename, "uploading image");
        let part = Part::bytes(image)
            .file_name(filename.to_string())
            .mime_str(mime)?;
        let resp = self
            .client
            .post(&url)
            .multipart(Form::new().part("file", part))
            .send()
            .await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(ClientError::Server {
            status: status.as_u16(),
            detail: error_detail(&body),
        });
    }
    Ok(serde_json::from_str(&body)?)
}

/// The `detail` field of an error body, or the raw body when it has none.
fn error_detail(body: &str) -> Value {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(mut map)) if map.contains_key("detail") => {
            map.remove("detail").unwrap_or(Value::Null)
        }
        _ => Value::String(body.to_string()),
    }
}
