use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::category::normalize_name;
use crate::database::models::Category;
use crate::database::repository::CategoryRepository;

const COLUMNS: &str = "id, uuid, organization_id, name, created_at";

#[async_trait]
impl CategoryRepository for PgStore {
    async fn list_categories(&self, organization_id: i64) -> Result<Vec<Category>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM categories WHERE organization_id IS NULL OR organization_id = $1 \
             ORDER BY organization_id NULLS FIRST, lower(name)",
            COLUMNS
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_category(&self, uuid: Uuid) -> Result<Option<Category>, DatabaseError> {
        let sql = format!("SELECT {} FROM categories WHERE uuid = $1", COLUMNS);
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn category_name_taken(&self, organization_id: i64, name: &str, exclude: Option<i64>) -> Result<bool, DatabaseError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM categories \
             WHERE organization_id = $1 AND lower(name) = $2 AND ($3::bigint IS NULL OR id <> $3))",
        )
        .bind(organization_id)
        .bind(normalize_name(name))
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn create_category(&self, organization_id: i64, name: &str) -> Result<Category, DatabaseError> {
        let sql = format!(
            "INSERT INTO categories (organization_id, name) VALUES ($1, $2) RETURNING {}",
            COLUMNS
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(organization_id)
            .bind(name.trim())
            .fetch_one(&self.pool)
            .await?)
    }

    async fn rename_category(&self, id: i64, name: &str) -> Result<Category, DatabaseError> {
        let sql = format!("UPDATE categories SET name = $2 WHERE id = $1 RETURNING {}", COLUMNS);
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("category {}", id)))
    }

    async fn count_category_courses(&self, id: i64) -> Result<i64, DatabaseError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE category_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn delete_category(&self, id: i64) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
