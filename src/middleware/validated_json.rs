use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// JSON body that has passed its `validator` rules. Malformed JSON is a 400, a body
/// over the route's limit is a 413; type mismatches and rule failures are a 422 with
/// per-field messages.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| match rejection {
            JsonRejection::JsonDataError(e) => ApiError::field("body", e.body_text()),
            JsonRejection::JsonSyntaxError(_) => ApiError::bad_request("Malformed JSON body"),
            JsonRejection::MissingJsonContentType(_) => ApiError::bad_request("Expected Content-Type: application/json"),
            other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => ApiError::payload_too_large("Request body is too large"),
            other => ApiError::bad_request(other.body_text()),
        })?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}
