//! Error types for the PDF page server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Message returned when a request carries no PDF payload
pub const PDF_REQUIRED: &str = "PDF data is required";

/// Message returned when a page selector is out of range or unparsable
pub const INVALID_PAGE: &str = "Invalid page number";

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or missing input. Never reaches an engine.
    #[error("{message}")]
    Validation {
        message: String,
        /// Page count of the submitted document, when it was known
        total_pages: Option<u32>,
    },

    /// Request body over the configured limit
    #[error("{0}")]
    PayloadTooLarge(String),

    /// The extraction/rendering engine failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            total_pages: None,
        }
    }

    pub fn pdf_required() -> Self {
        Self::validation(PDF_REQUIRED)
    }

    pub fn invalid_page(total_pages: u32) -> Self {
        AppError::Validation {
            message: INVALID_PAGE.to_string(),
            total_pages: Some(total_pages),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Backend(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Task join error: {}", err))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(rename = "totalPages", skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            AppError::Validation {
                message,
                total_pages,
            } => {
                tracing::debug!("Rejected request: {}", message);
                ErrorResponse {
                    error: message,
                    total_pages,
                }
            }
            AppError::PayloadTooLarge(message) => {
                tracing::warn!("Rejected oversized request: {}", message);
                ErrorResponse {
                    error: message,
                    total_pages: None,
                }
            }
            AppError::Backend(e) => {
                tracing::error!("Backend failure: {}", e);
                ErrorResponse {
                    error: e.to_string(),
                    total_pages: None,
                }
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ErrorResponse {
                    error: msg,
                    total_pages: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}
