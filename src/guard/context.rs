use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use super::actor::Actor;
use super::capability::{Capability, CapabilityPolicy};
use super::scope::{assert_owned, ScopeError, TenantOwned};
use crate::app::AppState;
use crate::error::ApiError;

/// The authenticated actor, with or without an organization
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(CurrentActor)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Organization-scoped request context. Extraction fails with 403 when the actor
/// has no resolvable organization, so handlers taking it never run for such actors.
#[derive(Clone)]
pub struct OrgContext {
    actor: Actor,
    organization_id: i64,
    policy: Arc<dyn CapabilityPolicy>,
}

#[async_trait]
impl FromRequestParts<AppState> for OrgContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentActor(actor) = CurrentActor::from_request_parts(parts, state).await?;

        let Some(membership) = actor.membership else {
            tracing::warn!("Actor {} has no resolvable organization", actor.uuid);
            return Err(ApiError::forbidden("No organization is associated with this account"));
        };

        Ok(Self {
            organization_id: membership.organization_id(),
            actor,
            policy: state.policy.clone(),
        })
    }
}

impl OrgContext {
    pub fn new(actor: Actor, organization_id: i64, policy: Arc<dyn CapabilityPolicy>) -> Self {
        Self { actor, organization_id, policy }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn organization_id(&self) -> i64 {
        self.organization_id
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.policy.has_capability(Some(&self.actor), capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if self.can(capability) {
            tracing::debug!("Actor {} granted '{}'", self.actor.uuid, capability);
            return Ok(());
        }
        tracing::warn!("Actor {} denied '{}'", self.actor.uuid, capability);
        Err(ApiError::forbidden(format!("Missing capability '{}'", capability)))
    }

    /// Tenant-match check on a fetched resource; mismatches surface as 404
    pub fn scoped<R: TenantOwned>(&self, resource: Option<R>) -> Result<R, ApiError> {
        assert_owned(resource, self.organization_id).map_err(|err| {
            if let ScopeError::Forbidden { kind } = &err {
                tracing::warn!(
                    "Actor {} (organization {}) touched a {} outside its organization",
                    self.actor.uuid,
                    self.organization_id,
                    kind
                );
            }
            ApiError::from(err)
        })
    }

    /// Capability then tenant check, the common prelude of every mutation
    pub fn authorize<R: TenantOwned>(&self, capability: Capability, resource: Option<R>) -> Result<R, ApiError> {
        self.require(capability)?;
        self.scoped(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{OrgMembership, Role, RolePolicy};
    use axum::http::Request;
    use uuid::Uuid;

    fn actor(role: Role, membership: Option<OrgMembership>) -> Actor {
        Actor {
            user_id: 1,
            uuid: Uuid::new_v4(),
            name: "Test".into(),
            role,
            membership,
            granted: Default::default(),
        }
    }

    #[tokio::test]
    async fn current_actor_requires_extension() {
        let (mut parts, _) = Request::new(()).into_parts();
        let err = CurrentActor::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn require_reports_forbidden() {
        let ctx = OrgContext::new(actor(Role::Student, Some(OrgMembership::StaffMember(3))), 3, Arc::new(RolePolicy));
        assert!(ctx.require(Capability::TakeQuizzes).is_ok());
        assert_eq!(ctx.require(Capability::ManageCourses).unwrap_err().status_code(), 403);
    }
}
