use std::any::Any;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Body returned for every rejected request
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Request validation failures, detected before any provider call
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Please enter a prompt")]
    MissingPrompt,
    #[error("No file was uploaded")]
    MissingFile,
    #[error("No file was selected")]
    EmptyFilename,
    #[error("Only CSV files are supported")]
    UnsupportedFormat,
    #[error("The uploaded file contains no prompts")]
    EmptyInput,
    #[error("The uploaded file is not valid UTF-8 text")]
    InvalidEncoding,
    #[error("The uploaded file is not a readable CSV file")]
    MalformedCsv,
    #[error("Invalid request format")]
    InvalidRequest,
}

/// Everything a front door handler can reject a request with
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Terminal failure reported for a single generation
    #[error("{0}")]
    Provider(String),
    #[error(transparent)]
    Upload(#[from] MultipartError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Api(_) => StatusCode::BAD_REQUEST,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Upload(e) => e.status(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Upload(e) => {
                log::warn!("Rejected upload: {}", e);
                e.body_text()
            }
            other => other.to_string(),
        };
        (self.status_code(), Json(ErrorBody::new(message))).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Response for a handler that panicked. The panic payload is logged, never
/// returned.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    log::error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new(INTERNAL_ERROR_MESSAGE)),
    )
        .into_response()
}
