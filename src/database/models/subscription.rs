use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::guard::TenantOwned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Canceled,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Subscription {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub organization_id: i64,
    pub plan: String,
    pub status: SubscriptionStatus,
    #[serde(skip_serializing)]
    pub external_id: Option<String>,
    pub checkout_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn is_cancelable(&self) -> bool {
        matches!(self.status, SubscriptionStatus::Pending | SubscriptionStatus::Active)
    }
}

impl TenantOwned for Subscription {
    const KIND: &'static str = "Subscription";

    fn organization_id(&self) -> Option<i64> {
        Some(self.organization_id)
    }
}
