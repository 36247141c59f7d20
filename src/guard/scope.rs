use thiserror::Error;

/// Anything that belongs to (at most) one organization
pub trait TenantOwned {
    /// Human-readable resource name used in error messages
    const KIND: &'static str;

    /// Owning organization; `None` for platform-wide rows
    fn organization_id(&self) -> Option<i64>;
}

/// Distinct outcomes of a tenant check. The HTTP layer reports both as 404.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("{kind} not found")]
    NotFound { kind: &'static str },

    #[error("{kind} belongs to another organization")]
    Forbidden { kind: &'static str },
}

/// Ensure a fetched resource exists and belongs to `organization_id`
pub fn assert_owned<R: TenantOwned>(resource: Option<R>, organization_id: i64) -> Result<R, ScopeError> {
    let resource = resource.ok_or(ScopeError::NotFound { kind: R::KIND })?;
    match resource.organization_id() {
        Some(owner) if owner == organization_id => Ok(resource),
        _ => Err(ScopeError::Forbidden { kind: R::KIND }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Thing(Option<i64>);

    impl TenantOwned for Thing {
        const KIND: &'static str = "Thing";

        fn organization_id(&self) -> Option<i64> {
            self.0
        }
    }

    #[test]
    fn absent_resource_is_not_found() {
        let err = assert_owned::<Thing>(None, 1).unwrap_err();
        assert_eq!(err, ScopeError::NotFound { kind: "Thing" });
    }

    #[test]
    fn other_tenant_is_forbidden() {
        let err = assert_owned(Some(Thing(Some(2))), 1).unwrap_err();
        assert_eq!(err, ScopeError::Forbidden { kind: "Thing" });
    }

    #[test]
    fn unowned_resource_is_forbidden() {
        let err = assert_owned(Some(Thing(None)), 1).unwrap_err();
        assert!(matches!(err, ScopeError::Forbidden { .. }));
    }

    #[test]
    fn matching_tenant_passes() {
        assert!(assert_owned(Some(Thing(Some(1))), 1).is_ok());
    }
}
