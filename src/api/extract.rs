//! Request body extractor that reports malformed JSON in the API error format.

use axum::extract::{rejection::JsonRejection, FromRequest};

use super::error::ApiError;

/// `axum::Json`, with body rejections (bad syntax, wrong field types, missing
/// content type) answered as a 400 validation error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid(format!("Invalid request body: {}", rejection.body_text()))
    }
}
