//! PostgreSQL backend. Queries are built at runtime and mapped with `FromRow`;
//! multi-step writes run inside one transaction.

mod categories;
mod courses;
mod documents;
mod outline;
mod quizzes;
mod subscriptions;
mod tickets;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::manager::{DatabaseError, DatabaseManager};
use super::models::{Organization, UserRecord};
use super::repository::{ActorRepository, Store};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const USER_COLUMNS: &str = "id, uuid, name, email, role, organization_id, created_at";

#[async_trait]
impl ActorRepository for PgStore {
    async fn find_user(&self, uuid: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE uuid = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, UserRecord>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn owned_organization(&self, user_id: i64) -> Result<Option<i64>, DatabaseError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT id FROM organizations WHERE owner_user_id = $1 ORDER BY id LIMIT 1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn instructor_organization(&self, user_id: i64) -> Result<Option<i64>, DatabaseError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT organization_id FROM instructors WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn granted_capabilities(&self, user_id: i64) -> Result<Vec<String>, DatabaseError> {
        Ok(sqlx::query_scalar::<_, String>("SELECT capability FROM user_capabilities WHERE user_id = $1 ORDER BY capability")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_organization(&self, id: i64) -> Result<Option<Organization>, DatabaseError> {
        Ok(sqlx::query_as::<_, Organization>(
            "SELECT id, uuid, name, owner_user_id, created_at FROM organizations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn admin_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE role = 'admin' ORDER BY id", USER_COLUMNS);
        Ok(sqlx::query_as::<_, UserRecord>(&sql).fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}
