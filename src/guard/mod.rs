//! Organization-scoped access guard.
//!
//! Resolution order per request: actor (JWT subject) -> organization membership ->
//! capability check -> tenant match on the fetched resource.

pub mod actor;
pub mod capability;
pub mod context;
pub mod scope;

pub use actor::{resolve_actor, Actor, OrgMembership, Role};
pub use capability::{has_capability, role_capabilities, Capability, CapabilityPolicy, RolePolicy};
pub use context::{CurrentActor, OrgContext};
pub use scope::{assert_owned, ScopeError, TenantOwned};
