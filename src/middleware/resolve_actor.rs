use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension,
};

use super::auth::AuthUser;
use crate::app::AppState;
use crate::error::ApiError;
use crate::guard::resolve_actor;

/// Load the actor behind the token and resolve its organization once for the request.
/// Must run after `jwt_auth_middleware`.
pub async fn resolve_actor_middleware(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let actor = resolve_actor(state.store.as_ref(), auth_user.user_uuid)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Token subject {} does not match any user", auth_user.user_uuid);
            ApiError::unauthorized("Unknown user")
        })?;

    match actor.membership {
        Some(membership) => tracing::debug!(
            "Actor {} resolved to organization {} as {}",
            actor.uuid,
            membership.organization_id(),
            membership.kind()
        ),
        None => tracing::debug!("Actor {} has no organization", actor.uuid),
    }

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}
