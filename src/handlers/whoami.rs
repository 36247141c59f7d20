use axum::extract::State;
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Organization;
use crate::guard::{Capability, CurrentActor, Role};
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct Whoami {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    /// How the organization was resolved; absent when there is none
    pub membership: Option<&'static str>,
    pub organization: Option<Organization>,
    pub capabilities: Vec<Capability>,
}

/// GET /auth/whoami - the caller, its organization and effective capabilities
pub async fn whoami(State(state): State<AppState>, CurrentActor(actor): CurrentActor) -> ApiResult<Whoami> {
    let organization = match actor.organization_id() {
        Some(id) => state.store.find_organization(id).await?,
        None => None,
    };

    Ok(ApiResponse::success(Whoami {
        id: actor.uuid,
        name: actor.name.clone(),
        role: actor.role,
        membership: actor.membership.map(|m| m.kind()),
        organization,
        capabilities: state.policy.capabilities_of(&actor),
    }))
}
