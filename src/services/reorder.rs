use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError {
    #[error("At least one id is required")]
    Empty,

    #[error("Duplicate id {0}")]
    Duplicate(Uuid),

    #[error("{0} is not a child of this parent")]
    NotASibling(Uuid),

    #[error("Too many ids to position")]
    TooMany,
}

/// Positions to write for a sibling family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    /// (internal id, new position) in request order
    pub assignments: Vec<(i64, i32)>,
    /// Siblings the request did not mention; their positions are left alone
    pub omitted: Vec<Uuid>,
}

/// Validate `ids` against the current siblings `(internal id, uuid)` and assign
/// `base + index` to each listed sibling.
pub fn plan_reorder(ids: &[Uuid], siblings: &[(i64, Uuid)], base: i32) -> Result<ReorderPlan, ReorderError> {
    if ids.is_empty() {
        return Err(ReorderError::Empty);
    }

    let mut seen = HashSet::with_capacity(ids.len());
    let mut assignments = Vec::with_capacity(ids.len());
    for (index, uuid) in ids.iter().enumerate() {
        if !seen.insert(*uuid) {
            return Err(ReorderError::Duplicate(*uuid));
        }
        let (id, _) = siblings
            .iter()
            .find(|(_, sibling)| sibling == uuid)
            .ok_or(ReorderError::NotASibling(*uuid))?;
        let position = i32::try_from(index)
            .ok()
            .and_then(|offset| base.checked_add(offset))
            .ok_or(ReorderError::TooMany)?;
        assignments.push((*id, position));
    }

    let omitted = siblings
        .iter()
        .filter(|(_, uuid)| !seen.contains(uuid))
        .map(|(_, uuid)| *uuid)
        .collect();

    Ok(ReorderPlan { assignments, omitted })
}
