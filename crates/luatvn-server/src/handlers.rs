use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use luatvn_core::{CombinedResult, ModelInfo, OcrResult, PredictionResult};
use serde_json::Value;
use tracing::info;

use crate::error::{ApiError, FieldError};
use crate::models::{BatchPredictionResponse, BatchTextInput, HealthResponse, RootResponse, TextInput};
use crate::state::AppState;

pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Vietnamese Legal Text Classification API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.classifier.model_name().to_string(),
    })
}

/// Liveness; answers while the model is still loading.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: state.classifier.is_loaded(),
    })
}

pub async fn model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.classifier.info())
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<TextInput>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(input) = payload?;
    if input.text.is_empty() {
        return Err(ApiError::validation(
            vec!["body".into(), "text".into()],
            "text must not be empty",
            "string_too_short",
        ));
    }

    let classifier = Arc::clone(&state.classifier);
    let prediction = tokio::task::spawn_blocking(move || classifier.infer(&input.text)).await??;
    info!(
        label = %prediction.predicted_label,
        confidence = prediction.confidence,
        "prediction served"
    );
    Ok(Json(prediction))
}

pub async fn predict_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchTextInput>, JsonRejection>,
) -> Result<Json<BatchPredictionResponse>, ApiError> {
    let Json(input) = payload?;
    if input.texts.is_empty() {
        return Err(ApiError::validation(
            vec!["body".into(), "texts".into()],
            "texts must contain at least one item",
            "too_short",
        ));
    }
    let empty: Vec<FieldError> = input
        .texts
        .iter()
        .enumerate()
        .filter(|(_, t)| t.is_empty())
        .map(|(i, _)| {
            FieldError::new(
                vec!["body".into(), "texts".into(), Value::from(i)],
                "text must not be empty",
                "string_too_short",
            )
        })
        .collect();
    if !empty.is_empty() {
        return Err(ApiError::Validation(empty));
    }

    let classifier = Arc::clone(&state.classifier);
    let predictions = tokio::task::spawn_blocking(move || {
        let texts: Vec<&str> = input.texts.iter().map(String::as_str).collect();
        classifier.infer_batch(&texts)
    })
    .await??;
    info!(count = predictions.len(), "batch prediction served");
    Ok(Json(BatchPredictionResponse { predictions }))
}

pub async fn ocr_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OcrResult>, ApiError> {
    let bytes = read_image_upload(multipart, state.max_upload_size).await?;
    let ocr = state.ocr.clone().ok_or_else(ocr_unavailable)?;

    let result = tokio::task::spawn_blocking(move || ocr.extract(&bytes)).await??;
    info!(chars = result.text.chars().count(), lines = result.lines.len(), "OCR served");
    Ok(Json(result))
}

pub async fn ocr_upload_and_classify(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CombinedResult>, ApiError> {
    let bytes = read_image_upload(multipart, state.max_upload_size).await?;
    let pipeline = state.pipeline().ok_or_else(ocr_unavailable)?;

    let combined = tokio::task::spawn_blocking(move || pipeline.process(&bytes)).await??;
    info!(
        chars = combined.ocr_result.text.chars().count(),
        classified = combined.classification.is_some(),
        "OCR + classification served"
    );
    Ok(Json(combined))
}

fn ocr_unavailable() -> ApiError {
    ApiError::Unavailable("OCR engine not initialized".into())
}

/// Pull the `file` field out of a multipart body, enforcing type and size.
async fn read_image_upload(mut multipart: Multipart, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let loc = || vec![Value::from("body"), Value::from("file")];

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::validation(
                loc(),
                format!("File must be an image (got {content_type:?})"),
                "value_error.content_type",
            ));
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            if data.len() + chunk.len() > max_size {
                return Err(ApiError::validation(
                    loc(),
                    format!("File too large. Maximum size: {} bytes", max_size),
                    "value_error.file_too_large",
                ));
            }
            data.extend_from_slice(&chunk);
        }
        return Ok(data);
    }

    Err(ApiError::validation(loc(), "Field required", "missing"))
}
