use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::Store;
use crate::guard::CapabilityPolicy;
use crate::handlers;
use crate::middleware::{jwt_auth_middleware, resolve_actor_middleware};
use crate::services::{FileStorage, Notifier, PaymentGateway};

/// Shared dependencies handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub policy: Arc<dyn CapabilityPolicy>,
    pub store: Arc<dyn Store>,
    pub storage: Arc<dyn FileStorage>,
    pub payments: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        // Uploaded files written by the local storage backend
        .nest_service("/files", ServeDir::new(&state.config.storage.root))
        // Protected
        .merge(protected_routes(state.clone()))
        // Global middleware
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state.config.security.cors_origins));

    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

/// Routes behind a bearer token. Layers run bottom-up: the token is checked first,
/// then the actor and its organization are resolved once for the request.
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/whoami", get(handlers::whoami::whoami))
        .nest("/organization", handlers::organization::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), resolve_actor_middleware))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(parsed))
}
