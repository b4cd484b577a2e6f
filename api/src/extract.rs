//! JSON extractor that reports body-decode failures in the structured
//! error shape instead of axum's plain-text rejection.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};

use crate::error::AppError;

/// Drop-in replacement for `axum::Json<T>` whose rejection is an
/// [`AppError::Validation`].
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(AppError::Validation {
                message: format!("Invalid request body: {}", rejection.body_text()),
                field: Some("body".to_string()),
                received: None,
                docs_hint: Some("The request body must be a JSON object.".to_string()),
            }),
        }
    }
}
