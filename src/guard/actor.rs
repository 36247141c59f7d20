use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::capability::Capability;
use crate::database::repository::ActorRepository;
use crate::database::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    OrganizationOwner,
    Instructor,
    Student,
    Admin,
}

/// How the actor is attached to its organization. Resolved once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "organization_id", rename_all = "snake_case")]
pub enum OrgMembership {
    DirectOwner(i64),
    StaffMember(i64),
    Instructor(i64),
}

impl OrgMembership {
    pub fn organization_id(&self) -> i64 {
        match *self {
            OrgMembership::DirectOwner(id)
            | OrgMembership::StaffMember(id)
            | OrgMembership::Instructor(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OrgMembership::DirectOwner(_) => "direct_owner",
            OrgMembership::StaffMember(_) => "staff_member",
            OrgMembership::Instructor(_) => "instructor",
        }
    }
}

/// Authenticated user with its organization membership and explicit grants
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub role: Role,
    pub membership: Option<OrgMembership>,
    pub granted: BTreeSet<Capability>,
}

impl Actor {
    pub fn organization_id(&self) -> Option<i64> {
        self.membership.map(|m| m.organization_id())
    }
}

/// Resolve the organization by trying, in order: owned organization, staff link,
/// then the instructor lookup. The instructor lookup only runs when the first two
/// come back empty and the role is instructor.
pub async fn resolve_membership<R: ActorRepository + ?Sized>(
    store: &R,
    user_id: i64,
    role: Role,
    staff_organization_id: Option<i64>,
) -> Result<Option<OrgMembership>, DatabaseError> {
    if let Some(org) = store.owned_organization(user_id).await? {
        return Ok(Some(OrgMembership::DirectOwner(org)));
    }
    if let Some(org) = staff_organization_id {
        return Ok(Some(OrgMembership::StaffMember(org)));
    }
    if role == Role::Instructor {
        if let Some(org) = store.instructor_organization(user_id).await? {
            return Ok(Some(OrgMembership::Instructor(org)));
        }
    }
    Ok(None)
}

/// Load the actor behind a token subject. `None` when the user does not exist.
pub async fn resolve_actor<R: ActorRepository + ?Sized>(
    store: &R,
    user_uuid: Uuid,
) -> Result<Option<Actor>, DatabaseError> {
    let Some(user) = store.find_user(user_uuid).await? else {
        return Ok(None);
    };

    let membership = resolve_membership(store, user.id, user.role, user.organization_id).await?;

    let granted = store
        .granted_capabilities(user.id)
        .await?
        .into_iter()
        .filter_map(|name| match name.parse::<Capability>() {
            Ok(capability) => Some(capability),
            Err(_) => {
                tracing::warn!("Ignoring unknown capability grant '{}' for user {}", name, user.uuid);
                None
            }
        })
        .collect();

    Ok(Some(Actor {
        user_id: user.id,
        uuid: user.uuid,
        name: user.name,
        role: user.role,
        membership,
        granted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;

    #[tokio::test]
    async fn owner_link_wins_over_staff_link() {
        let store = MemoryStore::new();
        let a = store.seed_organization("A").await;
        let b = store.seed_organization("B").await;
        let user = store.seed_user("Olga", Role::OrganizationOwner, Some(b.id)).await;
        store.set_owner(a.id, user.id).await;

        let actor = resolve_actor(&store, user.uuid).await.unwrap().unwrap();
        assert_eq!(actor.membership, Some(OrgMembership::DirectOwner(a.id)));
    }

    #[tokio::test]
    async fn staff_link_resolves() {
        let store = MemoryStore::new();
        let org = store.seed_organization("A").await;
        let user = store.seed_user("Sam", Role::Student, Some(org.id)).await;

        let actor = resolve_actor(&store, user.uuid).await.unwrap().unwrap();
        assert_eq!(actor.membership, Some(OrgMembership::StaffMember(org.id)));
    }

    #[tokio::test]
    async fn instructor_lookup_is_last_resort() {
        let store = MemoryStore::new();
        let org = store.seed_organization("A").await;
        let user = store.seed_user("Ines", Role::Instructor, None).await;
        store.link_instructor(user.id, org.id).await;

        let actor = resolve_actor(&store, user.uuid).await.unwrap().unwrap();
        assert_eq!(actor.membership, Some(OrgMembership::Instructor(org.id)));
    }

    #[tokio::test]
    async fn instructor_link_ignored_for_other_roles() {
        let store = MemoryStore::new();
        let org = store.seed_organization("A").await;
        let user = store.seed_user("Stu", Role::Student, None).await;
        store.link_instructor(user.id, org.id).await;

        let actor = resolve_actor(&store, user.uuid).await.unwrap().unwrap();
        assert_eq!(actor.membership, None);
        assert_eq!(actor.organization_id(), None);
    }

    #[tokio::test]
    async fn unknown_grants_are_dropped() {
        let store = MemoryStore::new();
        let user = store.seed_user("Gail", Role::Student, None).await;
        store.grant(user.id, "manage_documents").await;
        store.grant(user.id, "launch_rockets").await;

        let actor = resolve_actor(&store, user.uuid).await.unwrap().unwrap();
        assert_eq!(actor.granted.len(), 1);
        assert!(actor.granted.contains(&Capability::ManageDocuments));
    }

    #[tokio::test]
    async fn unknown_user_resolves_to_none() {
        let store = MemoryStore::new();
        assert!(resolve_actor(&store, Uuid::new_v4()).await.unwrap().is_none());
    }
}
