//! Error → HTTP response mapping. Every error body is `{"detail": ...}`.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use luatvn_ai::{ClassifyError, OcrError, PipelineError};
use luatvn_core::OcrResult;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// One entry of a 422 `detail` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<Value>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn new(loc: Vec<Value>, msg: impl Into<String>, kind: &str) -> Self {
        Self {
            loc,
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),

    /// OCR succeeded, classification did not. `unavailable` marks a model
    /// that is not loaded yet, answered with 503 instead of 500.
    #[error("classification failed: {message}")]
    Partial {
        message: String,
        ocr_result: Box<OcrResult>,
        unavailable: bool,
    },
}

impl ApiError {
    pub fn validation(loc: Vec<Value>, msg: impl Into<String>, kind: &str) -> Self {
        Self::Validation(vec![FieldError::new(loc, msg, kind)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) | Self::Partial { unavailable: true, .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Internal(_) | Self::Partial { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(self) -> Value {
        match self {
            Self::Validation(errors) => json!(errors),
            Self::Unavailable(msg) | Self::Internal(msg) => Value::String(msg),
            Self::Partial {
                message,
                ocr_result,
                ..
            } => json!({
                "stage": "classification",
                "message": message,
                "ocr_result": ocr_result,
            }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal(_) | Self::Partial { unavailable: false, .. } => tracing::error!(%status, error = %self, "request failed"),
            _ => tracing::warn!(%status, error = %self, "request rejected"),
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::NotLoaded | ClassifyError::ModelLoad(_) => {
                Self::Unavailable("Model not loaded".into())
            }
            ClassifyError::InvalidInput(msg) => {
                Self::validation(vec!["body".into()], msg, "value_error")
            }
            ClassifyError::Inference(_) => Self::Internal(format!("Prediction failed: {err}")),
        }
    }
}

impl From<OcrError> for ApiError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::InvalidImage(msg) => Self::validation(
                vec!["body".into(), "file".into()],
                format!("Invalid image file: {msg}"),
                "value_error.image",
            ),
            OcrError::Init(_) => Self::Unavailable(format!("OCR engine unavailable: {err}")),
            OcrError::Engine(_) => Self::Internal(format!("OCR processing failed: {err}")),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Ocr(e) => e.into(),
            PipelineError::Classification { ocr_result, source } => Self::Partial {
                unavailable: matches!(
                    source,
                    ClassifyError::NotLoaded | ClassifyError::ModelLoad(_)
                ),
                message: source.to_string(),
                ocr_result,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(vec!["body".into()], rejection.body_text(), "json_invalid")
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let kind = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            "value_error.file_too_large"
        } else {
            "multipart_invalid"
        };
        Self::validation(vec!["body".into()], err.body_text(), kind)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("worker task failed: {err}"))
    }
}
