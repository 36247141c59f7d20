use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{Subscription, SubscriptionStatus};
use crate::database::repository::SubscriptionRepository;

const COLUMNS: &str = "id, uuid, organization_id, plan, status, external_id, checkout_url, created_at, canceled_at";

#[async_trait]
impl SubscriptionRepository for PgStore {
    async fn list_subscriptions(&self, organization_id: i64) -> Result<Vec<Subscription>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE organization_id = $1 ORDER BY created_at DESC, id DESC",
            COLUMNS
        );
        Ok(sqlx::query_as::<_, Subscription>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_subscription(&self, uuid: Uuid) -> Result<Option<Subscription>, DatabaseError> {
        let sql = format!("SELECT {} FROM subscriptions WHERE uuid = $1", COLUMNS);
        Ok(sqlx::query_as::<_, Subscription>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn active_subscription(&self, organization_id: i64) -> Result<Option<Subscription>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE organization_id = $1 AND status = $2 ORDER BY id DESC LIMIT 1",
            COLUMNS
        );
        Ok(sqlx::query_as::<_, Subscription>(&sql)
            .bind(organization_id)
            .bind(SubscriptionStatus::Active)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_subscription(&self, organization_id: i64, plan: &str, external_id: &str, checkout_url: &str) -> Result<Subscription, DatabaseError> {
        let sql = format!(
            "INSERT INTO subscriptions (organization_id, plan, status, external_id, checkout_url) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            COLUMNS
        );
        Ok(sqlx::query_as::<_, Subscription>(&sql)
            .bind(organization_id)
            .bind(plan)
            .bind(SubscriptionStatus::Pending)
            .bind(external_id)
            .bind(checkout_url)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn cancel_subscription(&self, id: i64) -> Result<Subscription, DatabaseError> {
        let sql = format!(
            "UPDATE subscriptions SET status = $2, canceled_at = now() WHERE id = $1 RETURNING {}",
            COLUMNS
        );
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(id)
            .bind(SubscriptionStatus::Canceled)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("subscription {}", id)))
    }
}
