use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::fs::FsError;
use crate::manager::RefreshError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("filesystem not found: {0}")]
    FilesystemNotFound(String),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::FilesystemNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Fs(FsError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Fs(_) => StatusCode::BAD_REQUEST,
            ApiError::Refresh(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
