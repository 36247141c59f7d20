use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{NewOutlineNode, OutlineLevel, OutlineNode};
use crate::database::repository::OutlineRepository;

/// Node columns plus the owning course, reached by joining up the hierarchy
fn select(level: OutlineLevel) -> &'static str {
    match level {
        OutlineLevel::Section => {
            "SELECT n.id, n.uuid, n.course_id AS parent_id, c.organization_id, c.kind AS course_kind, \
             n.title, n.body, NULL::bigint AS document_id, NULL::uuid AS document_uuid, n.position \
             FROM sections n JOIN courses c ON c.id = n.course_id"
        }
        OutlineLevel::Objective => {
            "SELECT n.id, n.uuid, n.course_id AS parent_id, c.organization_id, c.kind AS course_kind, \
             n.title, n.body, NULL::bigint AS document_id, NULL::uuid AS document_uuid, n.position \
             FROM objectives n JOIN courses c ON c.id = n.course_id"
        }
        OutlineLevel::Chapter => {
            "SELECT n.id, n.uuid, n.section_id AS parent_id, c.organization_id, c.kind AS course_kind, \
             n.title, n.body, n.document_id, d.uuid AS document_uuid, n.position \
             FROM chapters n JOIN sections s ON s.id = n.section_id JOIN courses c ON c.id = s.course_id \
             LEFT JOIN documents d ON d.id = n.document_id"
        }
        OutlineLevel::SubChapter => {
            "SELECT n.id, n.uuid, n.chapter_id AS parent_id, c.organization_id, c.kind AS course_kind, \
             n.title, n.body, NULL::bigint AS document_id, NULL::uuid AS document_uuid, n.position \
             FROM sub_chapters n JOIN chapters ch ON ch.id = n.chapter_id \
             JOIN sections s ON s.id = ch.section_id JOIN courses c ON c.id = s.course_id"
        }
    }
}

impl PgStore {
    async fn node_by_id(&self, level: OutlineLevel, id: i64) -> Result<OutlineNode, DatabaseError> {
        let sql = format!("{} WHERE n.id = $1", select(level));
        sqlx::query_as::<_, OutlineNode>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {}", level.label(), id)))
    }
}

#[async_trait]
impl OutlineRepository for PgStore {
    async fn list_nodes(&self, level: OutlineLevel, parent_id: i64) -> Result<Vec<OutlineNode>, DatabaseError> {
        let sql = format!(
            "{} WHERE n.{} = $1 ORDER BY n.position, n.id",
            select(level),
            level.parent_column()
        );
        Ok(sqlx::query_as::<_, OutlineNode>(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_node(&self, level: OutlineLevel, uuid: Uuid) -> Result<Option<OutlineNode>, DatabaseError> {
        let sql = format!("{} WHERE n.uuid = $1", select(level));
        Ok(sqlx::query_as::<_, OutlineNode>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_node(&self, level: OutlineLevel, parent_id: i64, input: &NewOutlineNode) -> Result<OutlineNode, DatabaseError> {
        let (table, parent) = (level.table(), level.parent_column());
        let next_position = format!(
            "COALESCE((SELECT MAX(position) + 1 FROM {table} WHERE {parent} = $1), {base})",
            base = level.position_base()
        );

        let id = if level.supports_documents() {
            let sql = format!(
                "INSERT INTO {table} ({parent}, title, body, document_id, position) \
                 VALUES ($1, $2, $3, $4, {next_position}) RETURNING id"
            );
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(parent_id)
                .bind(&input.title)
                .bind(&input.body)
                .bind(input.document_id)
                .fetch_one(&self.pool)
                .await?
        } else {
            let sql = format!(
                "INSERT INTO {table} ({parent}, title, body, position) \
                 VALUES ($1, $2, $3, {next_position}) RETURNING id"
            );
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(parent_id)
                .bind(&input.title)
                .bind(&input.body)
                .fetch_one(&self.pool)
                .await?
        };
        self.node_by_id(level, id).await
    }

    async fn update_node(&self, level: OutlineLevel, id: i64, input: &NewOutlineNode) -> Result<OutlineNode, DatabaseError> {
        let table = level.table();
        if level.supports_documents() {
            let sql = format!("UPDATE {table} SET title = $2, body = $3, document_id = $4 WHERE id = $1");
            sqlx::query(&sql)
                .bind(id)
                .bind(&input.title)
                .bind(&input.body)
                .bind(input.document_id)
                .execute(&self.pool)
                .await?;
        } else {
            let sql = format!("UPDATE {table} SET title = $2, body = $3 WHERE id = $1");
            sqlx::query(&sql)
                .bind(id)
                .bind(&input.title)
                .bind(&input.body)
                .execute(&self.pool)
                .await?;
        }
        self.node_by_id(level, id).await
    }

    async fn delete_node(&self, level: OutlineLevel, id: i64) -> Result<(), DatabaseError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", level.table());
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn apply_positions(&self, level: OutlineLevel, parent_id: i64, positions: &[(i64, i32)]) -> Result<(), DatabaseError> {
        let sql = format!(
            "UPDATE {} SET position = $3 WHERE id = $1 AND {} = $2",
            level.table(),
            level.parent_column()
        );

        let mut tx = self.pool.begin().await?;
        for &(id, position) in positions {
            let result = sqlx::query(&sql)
                .bind(id)
                .bind(parent_id)
                .bind(position)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() != 1 {
                // Dropping the transaction rolls back earlier rows
                return Err(DatabaseError::NotFound(format!("{} {}", level.label(), id)));
            }
        }
        tx.commit().await?;
        Ok(())
    }
}
