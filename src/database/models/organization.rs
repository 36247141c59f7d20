use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::guard::Role;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Organization {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub owner_user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Raw user row; the organization link here is the staff "belongs-to" association
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserRecord {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub organization_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
