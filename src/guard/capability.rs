use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::actor::{Actor, Role};

/// Named permission checked before any tenant-scoped action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewContent,
    ManageCourses,
    ManageSessions,
    ManageCategories,
    ManageDocuments,
    ManageQuizzes,
    GradeQuizzes,
    TakeQuizzes,
    CreateTickets,
    ManageTickets,
    ManageSubscriptions,
}

impl Capability {
    pub const ALL: [Capability; 11] = [
        Capability::ViewContent,
        Capability::ManageCourses,
        Capability::ManageSessions,
        Capability::ManageCategories,
        Capability::ManageDocuments,
        Capability::ManageQuizzes,
        Capability::GradeQuizzes,
        Capability::TakeQuizzes,
        Capability::CreateTickets,
        Capability::ManageTickets,
        Capability::ManageSubscriptions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::ViewContent => "view_content",
            Capability::ManageCourses => "manage_courses",
            Capability::ManageSessions => "manage_sessions",
            Capability::ManageCategories => "manage_categories",
            Capability::ManageDocuments => "manage_documents",
            Capability::ManageQuizzes => "manage_quizzes",
            Capability::GradeQuizzes => "grade_quizzes",
            Capability::TakeQuizzes => "take_quizzes",
            Capability::CreateTickets => "create_tickets",
            Capability::ManageTickets => "manage_tickets",
            Capability::ManageSubscriptions => "manage_subscriptions",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

/// Default capability set carried by each role
pub fn role_capabilities(role: Role) -> &'static [Capability] {
    use Capability::*;

    match role {
        Role::OrganizationOwner => &Capability::ALL,
        Role::Instructor => &[
            ViewContent,
            ManageCourses,
            ManageSessions,
            ManageDocuments,
            ManageQuizzes,
            GradeQuizzes,
            CreateTickets,
        ],
        Role::Student => &[ViewContent, TakeQuizzes, CreateTickets],
        Role::Admin => &[ViewContent, ManageTickets],
    }
}

/// Single decision point for "may this actor do X"; every handler goes through it
pub trait CapabilityPolicy: Send + Sync {
    fn has_capability(&self, actor: Option<&Actor>, capability: Capability) -> bool;

    /// Every capability the actor currently holds, sorted
    fn capabilities_of(&self, actor: &Actor) -> Vec<Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(|c| self.has_capability(Some(actor), *c))
            .collect()
    }
}

/// Role defaults plus explicit per-user grants
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl CapabilityPolicy for RolePolicy {
    fn has_capability(&self, actor: Option<&Actor>, capability: Capability) -> bool {
        has_capability(actor, capability)
    }
}

/// Fails closed: no actor means no capability
pub fn has_capability(actor: Option<&Actor>, capability: Capability) -> bool {
    let Some(actor) = actor else {
        return false;
    };
    role_capabilities(actor.role).contains(&capability) || actor.granted.contains(&capability)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::actor::OrgMembership;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn actor(role: Role, granted: &[Capability]) -> Actor {
        Actor {
            user_id: 1,
            uuid: Uuid::new_v4(),
            name: "Test".into(),
            role,
            membership: Some(OrgMembership::StaffMember(7)),
            granted: granted.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn missing_actor_fails_closed() {
        for capability in Capability::ALL {
            assert!(!has_capability(None, capability));
        }
    }

    #[test]
    fn owner_holds_everything() {
        let owner = actor(Role::OrganizationOwner, &[]);
        assert!(Capability::ALL.iter().all(|c| has_capability(Some(&owner), *c)));
    }

    #[test]
    fn student_cannot_manage_courses() {
        let student = actor(Role::Student, &[]);
        assert!(has_capability(Some(&student), Capability::TakeQuizzes));
        assert!(!has_capability(Some(&student), Capability::ManageCourses));
        assert!(!has_capability(Some(&student), Capability::GradeQuizzes));
    }

    #[test]
    fn explicit_grants_extend_role() {
        let student = actor(Role::Student, &[Capability::ManageDocuments]);
        assert!(has_capability(Some(&student), Capability::ManageDocuments));
        assert!(!has_capability(Some(&student), Capability::ManageCategories));
    }

    #[test]
    fn parses_capability_names() {
        assert_eq!("grade_quizzes".parse::<Capability>(), Ok(Capability::GradeQuizzes));
        assert!("delete_everything".parse::<Capability>().is_err());
        for c in Capability::ALL {
            assert_eq!(c.as_str().parse::<Capability>(), Ok(c));
        }
    }

    #[test]
    fn policy_lists_capabilities_in_order() {
        let instructor = actor(Role::Instructor, &[]);
        let caps = RolePolicy.capabilities_of(&instructor);
        assert!(caps.contains(&Capability::GradeQuizzes));
        assert!(!caps.contains(&Capability::ManageSubscriptions));
        let mut sorted = caps.clone();
        sorted.sort();
        assert_eq!(caps, sorted);
    }
}
