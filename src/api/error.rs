//! Unified API error handling.
//!
//! Every failed request gets a JSON body of the form
//! `{ "error": "<message>", "code": "<machine code>", ... }`. Validation
//! failures add a `fields` map, and some errors carry extra top-level keys
//! that clients rely on (`alreadyVoted`/`voterId`, `sessionActive`, ...).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::engine::VotingError;

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Client errors (4xx)
    BadRequest,
    Forbidden,
    NotFound,
    Conflict,
    ValidationError,

    // Server errors (5xx)
    InternalError,
    DatabaseError,
}

impl ErrorCode {
    /// Get the default HTTP status code for this error code.
    ///
    /// Conflicts (double votes, duplicate emails, already closed) are
    /// reported as 400, which is what existing clients expect.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::DatabaseError => "database_error",
        }
    }
}

/// The serialized error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Machine-readable error code
    pub code: String,
    /// Per-field validation messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<HashMap<String, Vec<String>>>,
    /// Additional top-level keys
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    /// HTTP status code (defaults to code's default status)
    status: StatusCode,
    message: String,
    fields: Option<HashMap<String, Vec<String>>>,
    extras: Map<String, Value>,
}

impl ApiError {
    /// Create a new API error with a specific code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status_code(),
            code,
            message: message.into(),
            fields: None,
            extras: Map::new(),
        }
    }

    /// Add a top-level key to the response body
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Add validation errors as details
    pub fn with_validation_errors(mut self, errors: HashMap<String, Vec<String>>) -> Self {
        self.fields = Some(errors);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    // -------------------------------------------------------------------------
    // Convenience constructors for common error types
    // -------------------------------------------------------------------------

    /// Bad request error (400)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Forbidden error (403) - the code is valid but the action is not allowed
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Not found error (404)
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Conflict error (400) - duplicate or wrong-state request
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Validation error (400) with field-level details
    pub fn validation(errors: HashMap<String, Vec<String>>) -> Self {
        let message = if errors.len() == 1 {
            errors
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", errors.len())
        };

        Self::new(ErrorCode::ValidationError, message).with_validation_errors(errors)
    }

    /// Single field validation error
    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self::validation(errors)
    }

    /// Validation error without a field breakdown
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Internal server error (500)
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error (500)
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let response = ErrorResponse {
            error: self.message,
            code: self.code.as_str().to_string(),
            fields: self.fields,
            extras: self.extras,
        };

        (self.status, Json(response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

// -------------------------------------------------------------------------
// Conversion implementations
// -------------------------------------------------------------------------

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);

        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    ApiError::conflict("A resource with this identifier already exists")
                } else if db_err.is_foreign_key_violation() {
                    ApiError::bad_request("Referenced resource does not exist")
                } else {
                    ApiError::database("A database error occurred")
                }
            }
            _ => ApiError::database("A database error occurred"),
        }
    }
}

impl From<VotingError> for ApiError {
    fn from(err: VotingError) -> Self {
        let message = err.to_string();
        match err {
            VotingError::Validation(_) => ApiError::invalid(message),
            VotingError::SessionNotFound | VotingError::NotFound(_) => ApiError::not_found(message),
            VotingError::SessionClosed | VotingError::NotInvited | VotingError::Forbidden(_) => {
                ApiError::forbidden(message)
            }
            VotingError::NameAlreadyUsed { voter_id } => ApiError::conflict(message)
                .with_extra("alreadyVoted", true)
                .with_extra("voterId", voter_id),
            VotingError::AlreadyVoted => {
                ApiError::conflict(message).with_extra("alreadyVoted", true)
            }
            VotingError::AlreadyClosed | VotingError::AlreadyOpen | VotingError::Conflict(_) => {
                ApiError::conflict(message)
            }
            VotingError::CodeSpaceExhausted => {
                tracing::error!("{}", message);
                ApiError::internal(message)
            }
            VotingError::Database(db_err) => db_err.into(),
        }
    }
}

// -------------------------------------------------------------------------
// Builder for validation errors
// -------------------------------------------------------------------------

/// Builder for collecting multiple validation errors
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: HashMap<String, Vec<String>>,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation error for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Build the ApiError if there are any errors
    pub fn build(self) -> Option<ApiError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(ApiError::validation(self.errors))
        }
    }

    /// Return Ok(()) if no errors, or Err(ApiError) if there are errors
    pub fn finish(self) -> Result<(), ApiError> {
        match self.build() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_code_status_codes() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::Conflict.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::DatabaseError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_error_single_field() {
        let mut errors = HashMap::new();
        errors.insert("title".to_string(), vec!["Title is required".to_string()]);
        let err = ApiError::validation(errors);
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "Title is required");
    }

    #[test]
    fn test_validation_field_keeps_message() {
        let err = ApiError::validation_field("adminCode", "Admin code is required");
        assert_eq!(err.message(), "Admin code is required");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.fields.as_ref().unwrap().contains_key("adminCode"));
    }

    #[test]
    fn test_validation_error_builder() {
        let mut builder = ValidationErrorBuilder::new();
        builder.add("title", "Title is required");
        builder.add("positions", "At least one position is required");
        builder.add("title", "Title is too long");

        assert!(!builder.is_empty());

        let err = builder.build().unwrap();
        assert!(err.message.contains("2 fields"));
        let fields = err.fields.as_ref().unwrap();
        assert_eq!(fields.get("title").unwrap().len(), 2);
        assert_eq!(fields.get("positions").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_builder_finishes_ok() {
        assert!(ValidationErrorBuilder::new().finish().is_ok());
    }

    #[test]
    fn test_voting_error_status_mapping() {
        let cases = [
            (VotingError::validation("Votes are required"), StatusCode::BAD_REQUEST),
            (VotingError::SessionNotFound, StatusCode::NOT_FOUND),
            (VotingError::NotFound("Candidate"), StatusCode::NOT_FOUND),
            (VotingError::SessionClosed, StatusCode::FORBIDDEN),
            (VotingError::NotInvited, StatusCode::FORBIDDEN),
            (VotingError::AlreadyVoted, StatusCode::BAD_REQUEST),
            (VotingError::AlreadyClosed, StatusCode::BAD_REQUEST),
            (VotingError::AlreadyOpen, StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            let label = err.to_string();
            assert_eq!(ApiError::from(err).status, expected, "{}", label);
        }
    }

    #[tokio::test]
    async fn test_name_reuse_body_carries_voter_id() {
        let err = ApiError::from(VotingError::NameAlreadyUsed {
            voter_id: "v-1".to_string(),
        });
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "This name has already been used to vote in this session"
        );
        assert_eq!(body["code"], "conflict");
        assert_eq!(body["alreadyVoted"], true);
        assert_eq!(body["voterId"], "v-1");
        assert!(body.get("fields").is_none());
    }

    #[tokio::test]
    async fn test_extras_are_flattened() {
        let err = ApiError::forbidden("Results will be available after voting closes")
            .with_extra("sessionActive", true);
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["sessionActive"], true);
        assert_eq!(body["code"], "forbidden");
    }
}
