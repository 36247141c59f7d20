use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "LMS API",
            "version": version,
            "description": "Multi-tenant learning-management platform API",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "whoami": "/auth/whoami (protected)",
                "categories": "/organization/categories[/:id] (protected)",
                "courses": "/organization/courses[/:id[/sections|/objectives]] (protected)",
                "sessions": "/organization/sessions[/:id[/sections|/objectives]] (protected)",
                "outline": "/organization/{sections,chapters,sub-chapters,objectives}/:id (protected)",
                "documents": "/organization/documents[/:id] (protected)",
                "quizzes": "/organization/quizzes[/:id[/questions|/attempts]] (protected)",
                "attempts": "/organization/attempts/:id[/answers|/submit] (protected)",
                "tickets": "/organization/tickets[/:id[/replies|/close]] (protected)",
                "subscriptions": "/organization/subscriptions[/checkout|/:id/cancel] (protected)",
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = state.store.backend();

    match state.store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": backend
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed for {} backend: {}", backend, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "Database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": backend
                    }
                })),
            )
        }
    }
}
