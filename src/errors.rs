use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::booking::BookingError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("internal server error")]
    Database(anyhow::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        };

        if let AppError::Database(err) = &self {
            tracing::error!(error = %err, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::ItemNotFound | BookingError::BookingNotFound => {
                AppError::NotFound(err.to_string())
            }
            BookingError::ItemUnavailable
            | BookingError::InsufficientSpots { .. }
            | BookingError::AlreadyTerminal { .. } => AppError::InvalidState(err.to_string()),
            BookingError::InvalidPartySize => AppError::Validation(err.to_string()),
            BookingError::NotOwner => AppError::Forbidden(err.to_string()),
            BookingError::Database(e) => AppError::Database(e),
        }
    }
}
