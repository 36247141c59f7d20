use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{NewTicket, Ticket, TicketReply, TicketStatus};
use crate::database::repository::TicketRepository;

const TICKET_SELECT: &str = "SELECT t.id, t.uuid, t.organization_id, t.author_user_id, u.uuid AS author_uuid, \
     t.subject, t.status, t.created_at, t.updated_at FROM tickets t JOIN users u ON u.id = t.author_user_id";

const REPLY_SELECT: &str = "SELECT r.id, r.uuid, r.ticket_id, r.author_user_id, u.uuid AS author_uuid, \
     r.body, r.created_at FROM ticket_replies r JOIN users u ON u.id = r.author_user_id";

async fn insert_reply(conn: &mut PgConnection, ticket_id: i64, author_user_id: i64, body: &str) -> Result<TicketReply, DatabaseError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO ticket_replies (ticket_id, author_user_id, body) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(ticket_id)
    .bind(author_user_id)
    .bind(body)
    .fetch_one(&mut *conn)
    .await?;

    let sql = format!("{} WHERE r.id = $1", REPLY_SELECT);
    Ok(sqlx::query_as::<_, TicketReply>(&sql).bind(id).fetch_one(&mut *conn).await?)
}

async fn ticket_by_id(conn: &mut PgConnection, id: i64) -> Result<Ticket, DatabaseError> {
    let sql = format!("{} WHERE t.id = $1", TICKET_SELECT);
    sqlx::query_as::<_, Ticket>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("ticket {}", id)))
}

#[async_trait]
impl TicketRepository for PgStore {
    async fn list_tickets(&self, organization_id: i64, author: Option<i64>, limit: i64, offset: i64) -> Result<(Vec<Ticket>, i64), DatabaseError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tickets WHERE organization_id = $1 AND ($2::bigint IS NULL OR author_user_id = $2)",
        )
        .bind(organization_id)
        .bind(author)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "{} WHERE t.organization_id = $1 AND ($2::bigint IS NULL OR t.author_user_id = $2) \
             ORDER BY t.created_at DESC, t.id DESC LIMIT $3 OFFSET $4",
            TICKET_SELECT
        );
        let items = sqlx::query_as::<_, Ticket>(&sql)
            .bind(organization_id)
            .bind(author)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok((items, total))
    }

    async fn find_ticket(&self, uuid: Uuid) -> Result<Option<Ticket>, DatabaseError> {
        let sql = format!("{} WHERE t.uuid = $1", TICKET_SELECT);
        Ok(sqlx::query_as::<_, Ticket>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_ticket(&self, input: &NewTicket) -> Result<(Ticket, TicketReply), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO tickets (organization_id, author_user_id, subject, status) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(input.organization_id)
        .bind(input.author_user_id)
        .bind(&input.subject)
        .bind(TicketStatus::Open)
        .fetch_one(&mut *tx)
        .await?;

        let reply = insert_reply(&mut tx, id, input.author_user_id, &input.message).await?;
        let ticket = ticket_by_id(&mut tx, id).await?;
        tx.commit().await?;
        Ok((ticket, reply))
    }

    async fn list_replies(&self, ticket_id: i64) -> Result<Vec<TicketReply>, DatabaseError> {
        let sql = format!("{} WHERE r.ticket_id = $1 ORDER BY r.created_at, r.id", REPLY_SELECT);
        Ok(sqlx::query_as::<_, TicketReply>(&sql)
            .bind(ticket_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn add_reply(&self, ticket_id: i64, author_user_id: i64, body: &str, status: Option<TicketStatus>) -> Result<Option<TicketReply>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let touched = sqlx::query(
            "UPDATE tickets SET status = COALESCE($2, status), updated_at = now() WHERE id = $1 AND status <> $3",
        )
        .bind(ticket_id)
        .bind(status)
        .bind(TicketStatus::Closed)
        .execute(&mut *tx)
        .await?;
        if touched.rows_affected() == 0 {
            return Ok(None);
        }

        let reply = insert_reply(&mut tx, ticket_id, author_user_id, body).await?;
        tx.commit().await?;
        Ok(Some(reply))
    }

    async fn set_ticket_status(&self, id: i64, status: TicketStatus) -> Result<Ticket, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("UPDATE tickets SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *conn)
            .await?;
        ticket_by_id(&mut conn, id).await
    }
}
