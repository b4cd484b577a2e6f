use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nutrifit_core::error::{self, ApiError};

use crate::llm::LlmError;
use crate::store::StoreError;

/// Internal error type that converts to structured API responses.
///
/// Downstream failure detail is logged in full but reduced to a best-effort
/// operator message in the response body; callers never see transport
/// internals.
#[derive(Debug)]
pub enum AppError {
    /// Malformed or incomplete caller input (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Shared-secret mismatch (401)
    Unauthorized { message: String },
    /// Store or model provider failure (500)
    Upstream { message: String },
    /// Fatal misconfiguration, e.g. a missing secret (500)
    Config(String),
    /// Anything else (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::Unauthorized { message } => (
                StatusCode::UNAUTHORIZED,
                ApiError {
                    error: error::codes::UNAUTHORIZED.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::Upstream { message } => {
                tracing::error!(request_id = %request_id, "upstream failure: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::UPSTREAM_ERROR.to_string(),
                        message,
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Config(detail) => {
                tracing::error!(request_id = %request_id, "configuration error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "The service is misconfigured".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!(request_id = %request_id, "internal error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Upstream {
            message: err.to_string(),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::Upstream {
            message: err.to_string(),
        }
    }
}
