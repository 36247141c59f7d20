use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::guard::TenantOwned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Answered,
    Closed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ticket {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub organization_id: i64,
    #[serde(skip_serializing)]
    pub author_user_id: i64,
    #[serde(rename = "author")]
    pub author_uuid: Uuid,
    pub subject: String,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantOwned for Ticket {
    const KIND: &'static str = "Ticket";

    fn organization_id(&self) -> Option<i64> {
        Some(self.organization_id)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketReply {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub ticket_id: i64,
    #[serde(skip_serializing)]
    pub author_user_id: i64,
    #[serde(rename = "author")]
    pub author_uuid: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A ticket is opened together with its first message
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub organization_id: i64,
    pub author_user_id: i64,
    pub subject: String,
    pub message: String,
}
