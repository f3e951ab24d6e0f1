// ============================================================================
// Error Handling - JSON error responses for the partner API
// ============================================================================
//
// Sankhya failures are already logged in detail by the client (method, URL,
// remote payload). Responses only carry a generic message and the status.
//
// ============================================================================

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::services::erp::SankhyaError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] JsonRejection),

    #[error("Query error: {0}")]
    Query(#[from] QueryRejection),

    #[error("Sankhya error: {0}")]
    Sankhya(#[from] SankhyaError),
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Validation(errors) => {
                let mut fields: Vec<String> = errors
                    .field_errors()
                    .keys()
                    .map(|field| field.to_string())
                    .collect();
                fields.sort();
                (
                    StatusCode::BAD_REQUEST,
                    format!("Missing required fields: {}", fields.join(", ")),
                )
            }
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "Invalid JSON".to_string()),
            AppError::Query(_) => (StatusCode::BAD_REQUEST, "Invalid query parameters".to_string()),
            AppError::Sankhya(err) => match err {
                SankhyaError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                SankhyaError::SessionExpired => (StatusCode::UNAUTHORIZED, err.to_string()),
                SankhyaError::Authentication
                | SankhyaError::Communication
                | SankhyaError::MalformedResponse(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
                SankhyaError::Config(_) => {
                    tracing::error!("Sankhya configuration error: {:?}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
