use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::guard::TenantOwned;

/// Course category. Rows without an organization are global and shared by every tenant.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub organization_id: Option<i64>,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn is_global(&self) -> bool {
        self.organization_id.is_none()
    }

    /// Global categories and the tenant's own custom ones
    pub fn is_visible_to(&self, organization_id: i64) -> bool {
        self.organization_id.map_or(true, |owner| owner == organization_id)
    }
}

impl TenantOwned for Category {
    const KIND: &'static str = "Category";

    fn organization_id(&self) -> Option<i64> {
        self.organization_id
    }
}

/// Normalized form used for case-insensitive uniqueness
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
