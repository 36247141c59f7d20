//! Tenant-scoped resources. Every handler here extracts an `OrgContext`, so actors
//! without a resolvable organization are turned away before any handler runs.

use axum::{Extension, Router};
use std::borrow::Cow;
use validator::ValidationError;

use crate::app::AppState;
use crate::database::models::CourseKind;

pub mod attempts;
pub mod categories;
pub mod courses;
pub mod documents;
pub mod outline;
pub mod quizzes;
pub mod subscriptions;
pub mod tickets;

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(categories::routes())
        .nest("/courses", courses::routes().layer(Extension(CourseKind::Course)))
        .nest("/sessions", courses::routes().layer(Extension(CourseKind::Session)))
        .merge(outline::routes())
        .merge(documents::routes())
        .merge(quizzes::routes())
        .merge(attempts::routes())
        .merge(tickets::routes())
        .merge(subscriptions::routes())
}

/// Required text field: rejects empty and whitespace-only values
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some(Cow::Borrowed("This field is required."));
        return Err(error);
    }
    Ok(())
}
