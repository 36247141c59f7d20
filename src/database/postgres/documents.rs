use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{Document, NewDocument};
use crate::database::repository::DocumentRepository;

const COLUMNS: &str = "id, uuid, organization_id, title, category, path, url, size_bytes, mime_type, original_name, created_at";

#[async_trait]
impl DocumentRepository for PgStore {
    async fn list_documents(&self, organization_id: i64, limit: i64, offset: i64) -> Result<(Vec<Document>, i64), DatabaseError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM documents WHERE organization_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            COLUMNS
        );
        let items = sqlx::query_as::<_, Document>(&sql)
            .bind(organization_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok((items, total))
    }

    async fn find_document(&self, uuid: Uuid) -> Result<Option<Document>, DatabaseError> {
        let sql = format!("SELECT {} FROM documents WHERE uuid = $1", COLUMNS);
        Ok(sqlx::query_as::<_, Document>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_document(&self, input: &NewDocument) -> Result<Document, DatabaseError> {
        let sql = format!(
            "INSERT INTO documents (organization_id, title, category, path, url, size_bytes, mime_type, original_name) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            COLUMNS
        );
        Ok(sqlx::query_as::<_, Document>(&sql)
            .bind(input.organization_id)
            .bind(&input.title)
            .bind(input.category)
            .bind(&input.path)
            .bind(&input.url)
            .bind(input.size_bytes)
            .bind(&input.mime_type)
            .bind(&input.original_name)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn count_document_references(&self, id: i64) -> Result<i64, DatabaseError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chapters WHERE document_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn delete_document(&self, id: i64) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
