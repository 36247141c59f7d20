use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{Course, CourseInput, CourseKind};
use crate::database::repository::CourseRepository;

const SELECT: &str = "SELECT c.id, c.uuid, c.organization_id, c.kind, c.title, c.description, \
     c.category_id, cat.uuid AS category_uuid, c.published, c.created_at, c.updated_at \
     FROM courses c LEFT JOIN categories cat ON cat.id = c.category_id";

impl PgStore {
    async fn course_by_id(&self, id: i64) -> Result<Course, DatabaseError> {
        let sql = format!("{} WHERE c.id = $1", SELECT);
        sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("course {}", id)))
    }
}

#[async_trait]
impl CourseRepository for PgStore {
    async fn list_courses(&self, organization_id: i64, kind: CourseKind, limit: i64, offset: i64) -> Result<(Vec<Course>, i64), DatabaseError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE organization_id = $1 AND kind = $2")
            .bind(organization_id)
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "{} WHERE c.organization_id = $1 AND c.kind = $2 ORDER BY c.created_at DESC, c.id DESC LIMIT $3 OFFSET $4",
            SELECT
        );
        let items = sqlx::query_as::<_, Course>(&sql)
            .bind(organization_id)
            .bind(kind)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok((items, total))
    }

    async fn find_course(&self, uuid: Uuid) -> Result<Option<Course>, DatabaseError> {
        let sql = format!("{} WHERE c.uuid = $1", SELECT);
        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_course(&self, organization_id: i64, kind: CourseKind, input: &CourseInput) -> Result<Course, DatabaseError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO courses (organization_id, kind, title, description, category_id, published) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(organization_id)
        .bind(kind)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.category_id)
        .bind(input.published)
        .fetch_one(&self.pool)
        .await?;
        self.course_by_id(id).await
    }

    async fn update_course(&self, id: i64, input: &CourseInput) -> Result<Course, DatabaseError> {
        sqlx::query(
            "UPDATE courses SET title = $2, description = $3, category_id = $4, published = $5, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.category_id)
        .bind(input.published)
        .execute(&self.pool)
        .await?;
        self.course_by_id(id).await
    }

    async fn delete_course(&self, id: i64) -> Result<(), DatabaseError> {
        // Outline rows go with it (ON DELETE CASCADE)
        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
