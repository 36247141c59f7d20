use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::guard::TenantOwned;
use crate::services::storage::FileCategory;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Document {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub organization_id: i64,
    pub title: String,
    pub category: FileCategory,
    #[serde(skip_serializing)]
    pub path: String,
    pub url: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub original_name: String,
    pub created_at: DateTime<Utc>,
}

impl TenantOwned for Document {
    const KIND: &'static str = "Document";

    fn organization_id(&self) -> Option<i64> {
        Some(self.organization_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub organization_id: i64,
    pub title: String,
    pub category: FileCategory,
    pub path: String,
    pub url: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub original_name: String,
}
