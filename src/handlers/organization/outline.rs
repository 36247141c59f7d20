//! Sections, objectives, chapters and sub-chapters. Every route carries its
//! `OutlineLevel` as an extension so one set of handlers serves all four families.

use axum::{
    extract::State,
    routing::{get, post, put},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{courses::load_course, not_blank};
use crate::app::AppState;
use crate::database::models::{CourseKind, NewOutlineNode, OutlineLevel, OutlineNode};
use crate::database::repository::{DocumentRepository, OutlineRepository};
use crate::error::ApiError;
use crate::guard::{Capability, OrgContext};
use crate::middleware::{ApiPath, ApiResponse, ApiResult, ValidatedJson};
use crate::services::plan_reorder;

/// Routes addressed by the node's own id, plus chapter and sub-chapter families
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sections/:id", node_routes(OutlineLevel::Section))
        .route(
            "/sections/:id/chapters",
            get(list_children)
                .post(create_child)
                .layer(Extension(OutlineLevel::Chapter)),
        )
        .route(
            "/sections/:id/chapters/reorder",
            post(reorder).layer(Extension(OutlineLevel::Chapter)),
        )
        .route("/chapters/:id", node_routes(OutlineLevel::Chapter))
        .route(
            "/chapters/:id/sub-chapters",
            get(list_children)
                .post(create_child)
                .layer(Extension(OutlineLevel::SubChapter)),
        )
        .route(
            "/chapters/:id/sub-chapters/reorder",
            post(reorder).layer(Extension(OutlineLevel::SubChapter)),
        )
        .route("/sub-chapters/:id", node_routes(OutlineLevel::SubChapter))
        .route("/objectives/:id", node_routes(OutlineLevel::Objective))
}

fn node_routes(level: OutlineLevel) -> axum::routing::MethodRouter<AppState> {
    put(update).delete(destroy).layer(Extension(level))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NodeRequest {
    #[validate(
        custom(function = "not_blank"),
        length(max = 200, message = "The title may not be greater than 200 characters.")
    )]
    pub title: String,
    #[validate(length(max = 20000, message = "The body may not be greater than 20000 characters."))]
    pub body: Option<String>,
    /// Chapters only: public id of one of the organization's documents
    pub document: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ReorderRequest {
    #[validate(length(max = 1000, message = "The ids may not have more than 1000 items."))]
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ReorderResult {
    pub items: Vec<OutlineNode>,
    /// Siblings missing from the request; their positions were left as they were
    pub omitted: Vec<Uuid>,
}

/// Internal id and course kind of the node or course a family hangs off
struct Parent {
    id: i64,
    kind: CourseKind,
}

async fn load_parent(
    state: &AppState,
    ctx: &OrgContext,
    level: OutlineLevel,
    course_kind: Option<CourseKind>,
    id: Uuid,
) -> Result<Parent, ApiError> {
    match level.parent_level() {
        Some(parent_level) => {
            let node = ctx.scoped(state.store.find_node(parent_level, id).await?)?;
            Ok(Parent { id: node.id, kind: node.course_kind })
        }
        None => {
            let kind = course_kind.unwrap_or(CourseKind::Course);
            let course = load_course(state, ctx, kind, id).await?;
            Ok(Parent { id: course.id, kind: course.kind })
        }
    }
}

async fn node_input(state: &AppState, ctx: &OrgContext, level: OutlineLevel, body: NodeRequest) -> Result<NewOutlineNode, ApiError> {
    let document_id = match body.document {
        Some(_) if !level.supports_documents() => {
            return Err(ApiError::field(
                "document",
                format!("A {} cannot reference a document.", level.label().to_lowercase()),
            ));
        }
        Some(uuid) => {
            let document = state
                .store
                .find_document(uuid)
                .await?
                .filter(|d| d.organization_id == ctx.organization_id())
                .ok_or_else(|| ApiError::field("document", "The selected document is invalid."))?;
            Some(document.id)
        }
        None => None,
    };

    Ok(NewOutlineNode {
        title: body.title.trim().to_string(),
        body: body.body,
        document_id,
    })
}

pub async fn list_children(
    State(state): State<AppState>,
    ctx: OrgContext,
    Extension(level): Extension<OutlineLevel>,
    course_kind: Option<Extension<CourseKind>>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Vec<OutlineNode>> {
    ctx.require(Capability::ViewContent)?;
    let parent = load_parent(&state, &ctx, level, course_kind.map(|Extension(k)| k), id).await?;

    let nodes = state.store.list_nodes(level, parent.id).await?;
    Ok(ApiResponse::success(nodes))
}

/// New nodes are appended after the last sibling
pub async fn create_child(
    State(state): State<AppState>,
    ctx: OrgContext,
    Extension(level): Extension<OutlineLevel>,
    course_kind: Option<Extension<CourseKind>>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(body): ValidatedJson<NodeRequest>,
) -> ApiResult<OutlineNode> {
    let parent = load_parent(&state, &ctx, level, course_kind.map(|Extension(k)| k), id).await?;
    ctx.require(parent.kind.manage_capability())?;
    let input = node_input(&state, &ctx, level, body).await?;

    let node = state.store.create_node(level, parent.id, &input).await?;
    tracing::debug!("{} {} created at position {}", level.label(), node.uuid, node.position);
    Ok(ApiResponse::created(node).with_message(format!("{} created", level.label())))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: OrgContext,
    Extension(level): Extension<OutlineLevel>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(body): ValidatedJson<NodeRequest>,
) -> ApiResult<OutlineNode> {
    let node = ctx.scoped(state.store.find_node(level, id).await?)?;
    ctx.require(node.course_kind.manage_capability())?;
    let input = node_input(&state, &ctx, level, body).await?;

    let node = state.store.update_node(level, node.id, &input).await?;
    Ok(ApiResponse::success(node).with_message(format!("{} updated", level.label())))
}

/// Children of the node go with it
pub async fn destroy(
    State(state): State<AppState>,
    ctx: OrgContext,
    Extension(level): Extension<OutlineLevel>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    let node = ctx.scoped(state.store.find_node(level, id).await?)?;
    ctx.require(node.course_kind.manage_capability())?;

    state.store.delete_node(level, node.id).await?;
    Ok(ApiResponse::message(format!("{} deleted", level.label())))
}

/// Assign `base + index` to each listed sibling in one transaction
pub async fn reorder(
    State(state): State<AppState>,
    ctx: OrgContext,
    Extension(level): Extension<OutlineLevel>,
    course_kind: Option<Extension<CourseKind>>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(body): ValidatedJson<ReorderRequest>,
) -> ApiResult<ReorderResult> {
    let parent = load_parent(&state, &ctx, level, course_kind.map(|Extension(k)| k), id).await?;
    ctx.require(parent.kind.manage_capability())?;

    let siblings: Vec<(i64, Uuid)> = state
        .store
        .list_nodes(level, parent.id)
        .await?
        .into_iter()
        .map(|node| (node.id, node.uuid))
        .collect();

    let plan = plan_reorder(&body.ids, &siblings, level.position_base())?;
    if !plan.omitted.is_empty() {
        tracing::warn!(
            "Reorder of {} under {} left {} siblings untouched: {:?}",
            level.label(),
            id,
            plan.omitted.len(),
            plan.omitted
        );
    }

    state.store.apply_positions(level, parent.id, &plan.assignments).await?;
    tracing::debug!("Reordered {} {} items under {}", plan.assignments.len(), level.label(), id);

    let items = state.store.list_nodes(level, parent.id).await?;
    Ok(ApiResponse::success(ReorderResult { items, omitted: plan.omitted }).with_message("Order updated"))
}
