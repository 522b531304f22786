use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::packager::PackagingError;
use crate::processing::ProcessingError;
use crate::storage::StorageError;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Failures that abort a request. Validation problems never get here; they
/// are reported inline by re-rendering the form.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),
    #[error("Packaging error: {0}")]
    Packaging(#[from] PackagingError),
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error("Malformed upload: {0}")]
    Upload(String),
    #[error("Worker pool error: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Packaging(PackagingError::InvalidScores(_)) | AppError::Upload(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::warn!("Request rejected: {}", self);
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
