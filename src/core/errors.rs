use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy of the answer pipeline.
///
/// None of these terminate the process: a failure during a question's
/// pipeline resolves to a terminal `SearchAction` with a readable message
/// appended to its answer text, and a failed corpus load leaves the system
/// running in a degraded, unanswerable state.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("corpus parse error: {0}")]
    Parse(String),
    #[error("search index is not ready")]
    IndexNotReady,
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("template error: {0}")]
    Template(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::IndexNotReady => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
