use axum::{
    extract::{Query, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::not_blank;
use crate::app::AppState;
use crate::database::models::{NewTicket, Ticket, TicketReply, TicketStatus};
use crate::error::ApiError;
use crate::guard::{Capability, OrgContext};
use crate::middleware::{ApiPath, ApiResponse, ApiResult, ValidatedJson};
use crate::services::{notify_admins, TicketEvent, TicketNotice};
use crate::types::{ListQuery, Page};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tickets", get(list).post(create))
        .route("/tickets/:id", get(show))
        .route("/tickets/:id/replies", post(reply))
        .route("/tickets/:id/close", post(close))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct TicketRequest {
    #[validate(
        custom(function = "not_blank"),
        length(max = 200, message = "The subject may not be greater than 200 characters.")
    )]
    pub subject: String,
    #[validate(
        custom(function = "not_blank"),
        length(max = 5000, message = "The message may not be greater than 5000 characters.")
    )]
    pub message: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ReplyRequest {
    #[validate(
        custom(function = "not_blank"),
        length(max = 5000, message = "The message may not be greater than 5000 characters.")
    )]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub replies: Vec<TicketReply>,
}

/// Members without manage_tickets only ever see their own tickets
fn visible(ctx: &OrgContext, ticket: Ticket) -> Result<Ticket, ApiError> {
    if ctx.can(Capability::ManageTickets) || ticket.author_user_id == ctx.actor().user_id {
        return Ok(ticket);
    }
    tracing::warn!("Actor {} asked for ticket {} of another user", ctx.actor().uuid, ticket.uuid);
    Err(ApiError::not_found("Ticket not found"))
}

fn require_ticket_access(ctx: &OrgContext) -> Result<(), ApiError> {
    if ctx.can(Capability::ManageTickets) {
        return Ok(());
    }
    ctx.require(Capability::CreateTickets)
}

fn notify(state: &AppState, ctx: &OrgContext, event: TicketEvent, ticket: &Ticket) {
    notify_admins(
        state.store.clone(),
        state.notifier.clone(),
        TicketNotice {
            event,
            ticket: ticket.uuid,
            subject: ticket.subject.clone(),
            author: ctx.actor().name.clone(),
        },
    );
}

pub async fn list(
    State(state): State<AppState>,
    ctx: OrgContext,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<Ticket>> {
    require_ticket_access(&ctx)?;
    let author = (!ctx.can(Capability::ManageTickets)).then_some(ctx.actor().user_id);
    let window = query.window(&state.config.api);

    let (tickets, total) = state
        .store
        .list_tickets(ctx.organization_id(), author, window.limit(), window.offset())
        .await?;
    Ok(ApiResponse::success(Page::new(tickets, window, total)))
}

/// Opens a ticket with its first message and notifies the admins
pub async fn create(
    State(state): State<AppState>,
    ctx: OrgContext,
    ValidatedJson(body): ValidatedJson<TicketRequest>,
) -> ApiResult<TicketDetail> {
    ctx.require(Capability::CreateTickets)?;

    let (ticket, first) = state
        .store
        .create_ticket(&NewTicket {
            organization_id: ctx.organization_id(),
            author_user_id: ctx.actor().user_id,
            subject: body.subject.trim().to_string(),
            message: body.message.trim().to_string(),
        })
        .await?;

    tracing::info!("Ticket {} opened by {}", ticket.uuid, ctx.actor().uuid);
    notify(&state, &ctx, TicketEvent::Created, &ticket);

    Ok(ApiResponse::created(TicketDetail { ticket, replies: vec![first] }).with_message("Ticket created"))
}

pub async fn show(State(state): State<AppState>, ctx: OrgContext, ApiPath(id): ApiPath<Uuid>) -> ApiResult<TicketDetail> {
    require_ticket_access(&ctx)?;
    let ticket = visible(&ctx, ctx.scoped(state.store.find_ticket(id).await?)?)?;

    let replies = state.store.list_replies(ticket.id).await?;
    Ok(ApiResponse::success(TicketDetail { ticket, replies }))
}

/// A reply from a ticket manager marks the ticket answered
pub async fn reply(
    State(state): State<AppState>,
    ctx: OrgContext,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(body): ValidatedJson<ReplyRequest>,
) -> ApiResult<TicketReply> {
    require_ticket_access(&ctx)?;
    let ticket = visible(&ctx, ctx.scoped(state.store.find_ticket(id).await?)?)?;

    let status = ctx.can(Capability::ManageTickets).then_some(TicketStatus::Answered);
    let reply = state
        .store
        .add_reply(ticket.id, ctx.actor().user_id, body.message.trim(), status)
        .await?
        .ok_or_else(|| ApiError::conflict("Ticket is closed"))?;

    notify(&state, &ctx, TicketEvent::Replied, &ticket);
    Ok(ApiResponse::created(reply).with_message("Reply added"))
}

pub async fn close(State(state): State<AppState>, ctx: OrgContext, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Ticket> {
    let ticket = ctx.authorize(Capability::ManageTickets, state.store.find_ticket(id).await?)?;
    if ticket.status == TicketStatus::Closed {
        return Err(ApiError::conflict("Ticket is already closed"));
    }

    let ticket = state.store.set_ticket_status(ticket.id, TicketStatus::Closed).await?;
    tracing::info!("Ticket {} closed by {}", ticket.uuid, ctx.actor().uuid);
    Ok(ApiResponse::success(ticket).with_message("Ticket closed"))
}
