use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::UserRecord;
use crate::database::repository::Store;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification webhook failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification webhook returned {0}")]
    Status(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketEvent {
    Created,
    Replied,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketNotice {
    pub event: TicketEvent,
    pub ticket: Uuid,
    pub subject: String,
    pub author: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &UserRecord, notice: &TicketNotice) -> Result<(), NotifyError>;
}

/// Writes notices to the log; used when no webhook is configured
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &UserRecord, notice: &TicketNotice) -> Result<(), NotifyError> {
        tracing::info!(
            "Notify {} <{}>: ticket {} {:?} by {}",
            recipient.name,
            recipient.email,
            notice.ticket,
            notice.event,
            notice.author
        );
        Ok(())
    }
}

/// POSTs one JSON document per recipient
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, recipient: &UserRecord, notice: &TicketNotice) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "recipient": { "id": recipient.uuid, "email": recipient.email },
            "notice": notice,
        });
        let response = self.client.post(&self.url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Fan a notice out to every admin in the background. Failures are logged and dropped.
pub fn notify_admins(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, notice: TicketNotice) {
    tokio::spawn(async move {
        let admins = match store.admin_users().await {
            Ok(admins) => admins,
            Err(e) => {
                tracing::warn!("Could not load admins for ticket {}: {}", notice.ticket, e);
                return;
            }
        };
        for admin in &admins {
            if let Err(e) = notifier.notify(admin, &notice).await {
                tracing::warn!("Notification to {} failed: {}", admin.uuid, e);
            }
        }
        tracing::debug!("Ticket {} notice sent to {} admins", notice.ticket, admins.len());
    });
}
