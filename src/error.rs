// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::auth::JwtError;
use crate::database::{AttemptError, DatabaseError};
use crate::guard::ScopeError;
use crate::services::{GradingError, PaymentError, ReorderError, StorageError};

/// Field name -> messages, serialized as the envelope's `errors` member
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request (malformed body)
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found (absent or owned by another organization)
    NotFound(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 422 Unprocessable Entity
    ValidationFailed { message: String, field_errors: FieldErrors },
    Conflict { message: String, data: Option<Value> },

    // 502 Bad Gateway (payment provider)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // 500 Internal Server Error; details only go to the log
    Internal { reference: Uuid },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::ValidationFailed { .. } => 422,
            ApiError::Conflict { .. } => 422,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Internal { .. } => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::ValidationFailed { message, .. } => message,
            ApiError::Conflict { message, .. } => message,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Internal { .. } => "An unexpected error occurred",
        }
    }

    /// Convert to the response envelope
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "message": self.message(),
        });
        match self {
            ApiError::ValidationFailed { field_errors, .. } => {
                body["errors"] = json!(field_errors);
            }
            ApiError::Conflict { data: Some(data), .. } => {
                body["data"] = data.clone();
            }
            ApiError::Internal { reference } => {
                body["reference"] = json!(reference);
            }
            _ => {}
        }
        body
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn validation(field_errors: FieldErrors) -> Self {
        ApiError::ValidationFailed {
            message: "The given data was invalid".to_string(),
            field_errors,
        }
    }

    /// Validation failure on a single field
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::validation(BTreeMap::from([(field.into(), vec![message.into()])]))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict { message: message.into(), data: None }
    }

    /// Conflict carrying the number of rows that block the operation
    pub fn conflict_with_count(message: impl Into<String>, count: i64) -> Self {
        ApiError::Conflict {
            message: message.into(),
            data: Some(json!({ "count": count })),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    /// Log the full error under a fresh reference; the client only sees the reference
    pub fn internal(err: impl std::fmt::Display) -> Self {
        let reference = Uuid::new_v4();
        tracing::error!(%reference, "Internal error: {}", err);
        ApiError::Internal { reference }
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        if err.is_unavailable() {
            tracing::error!("Database unavailable: {}", err);
            return ApiError::service_unavailable("Database temporarily unavailable");
        }
        match err {
            DatabaseError::NotFound(what) => {
                tracing::debug!("Row vanished mid-request: {}", what);
                ApiError::not_found("Resource not found")
            }
            DatabaseError::UniqueViolation(constraint) => {
                tracing::debug!("Unique constraint {} violated", constraint);
                ApiError::conflict("Resource already exists")
            }
            other => ApiError::internal(other),
        }
    }
}

impl From<ScopeError> for ApiError {
    fn from(err: ScopeError) -> Self {
        // Foreign resources are reported exactly like missing ones
        match err {
            ScopeError::NotFound { kind } | ScopeError::Forbidden { kind } => {
                ApiError::not_found(format!("{} not found", kind))
            }
        }
    }
}

impl From<ReorderError> for ApiError {
    fn from(err: ReorderError) -> Self {
        ApiError::field("ids", err.to_string())
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        match err {
            GradingError::NotInProgress(_) => ApiError::conflict("Attempt has already been submitted"),
            GradingError::NotSubmitted => ApiError::conflict("Attempt has not been submitted yet"),
            GradingError::AnswerNotFound => ApiError::not_found("Answer not found"),
            GradingError::PointsOutOfRange { .. } => ApiError::field("points", err.to_string()),
        }
    }
}

impl From<AttemptError> for ApiError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::Grading(e) => e.into(),
            AttemptError::Database(e) => e.into(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnknownCategory(_) => ApiError::field("category", err.to_string()),
            StorageError::TooLarge { .. } | StorageError::UnsupportedType { .. } | StorageError::Empty => {
                ApiError::field("file", err.to_string())
            }
            StorageError::Io(_) | StorageError::InvalidUrl(_) => ApiError::internal(err),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::UnknownPlan(_) => ApiError::field("plan", err.to_string()),
            PaymentError::NotConfigured => ApiError::service_unavailable("Payments are not configured"),
            other => {
                tracing::error!("Payment provider error: {}", other);
                ApiError::bad_gateway("Payment provider error")
            }
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        tracing::debug!("Rejected bearer token: {}", err);
        ApiError::unauthorized("Invalid or expired token")
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut field_errors = FieldErrors::new();
        for (field, errors) in errors.field_errors() {
            let messages = field_errors.entry(field.to_string()).or_default();
            for error in errors {
                messages.push(
                    error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("The {} field is invalid ({})", field, error.code)),
                );
            }
        }
        ApiError::validation(field_errors)
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_errors_collapse_to_not_found() {
        let missing: ApiError = ScopeError::NotFound { kind: "Course" }.into();
        let foreign: ApiError = ScopeError::Forbidden { kind: "Course" }.into();
        assert_eq!(missing.status_code(), 404);
        assert_eq!(foreign.status_code(), 404);
        assert_eq!(missing.to_json(), foreign.to_json());
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::internal("connection reset by peer at 10.0.0.5");
        let body = err.to_json();
        assert_eq!(err.status_code(), 500);
        assert_eq!(body["success"], false);
        assert!(body["reference"].is_string());
        assert!(!body.to_string().contains("10.0.0.5"));
    }

    #[test]
    fn field_errors_serialize_under_errors() {
        let body = ApiError::field("name", "The name has already been taken.").to_json();
        assert_eq!(body["errors"]["name"][0], "The name has already been taken.");
        assert!(body.get("data").is_none());
    }

    #[test]
    fn blocked_delete_reports_count() {
        let err = ApiError::conflict_with_count("Category is in use", 3);
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.to_json()["data"]["count"], 3);
    }

    #[test]
    fn unavailable_database_maps_to_503() {
        let err: ApiError = DatabaseError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.status_code(), 503);
        let err: ApiError = DatabaseError::UniqueViolation("x".into()).into();
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn grading_conflicts() {
        let err: ApiError = GradingError::NotSubmitted.into();
        assert_eq!(err.status_code(), 422);
        assert!(err.to_json().get("errors").is_none());
        let err: ApiError = GradingError::PointsOutOfRange { max: 5 }.into();
        assert!(err.to_json()["errors"]["points"].is_array());
    }
}
