//! Courses and live sessions. Both live in one table and share these handlers; the
//! router mounts them twice with the `CourseKind` supplied as a request extension.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{not_blank, outline};
use crate::app::AppState;
use crate::database::models::{Course, CourseInput, CourseKind, OutlineLevel};
use crate::database::repository::{CategoryRepository, CourseRepository};
use crate::error::ApiError;
use crate::guard::{Capability, OrgContext};
use crate::middleware::{ApiPath, ApiResponse, ApiResult, ValidatedJson};
use crate::types::{ListQuery, Page};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).put(update).delete(destroy))
        .route(
            "/:id/sections",
            get(outline::list_children)
                .post(outline::create_child)
                .layer(Extension(OutlineLevel::Section)),
        )
        .route(
            "/:id/sections/reorder",
            post(outline::reorder).layer(Extension(OutlineLevel::Section)),
        )
        .route(
            "/:id/objectives",
            get(outline::list_children)
                .post(outline::create_child)
                .layer(Extension(OutlineLevel::Objective)),
        )
        .route(
            "/:id/objectives/reorder",
            post(outline::reorder).layer(Extension(OutlineLevel::Objective)),
        )
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CourseRequest {
    #[validate(
        custom(function = "not_blank"),
        length(max = 200, message = "The title may not be greater than 200 characters.")
    )]
    pub title: String,
    #[validate(length(max = 5000, message = "The description may not be greater than 5000 characters."))]
    pub description: Option<String>,
    /// Public id of a global or organization category
    pub category: Option<Uuid>,
    pub published: bool,
}

/// Fetch a course of the mounted kind that belongs to the caller's organization
pub(super) async fn load_course(
    state: &AppState,
    ctx: &OrgContext,
    kind: CourseKind,
    id: Uuid,
) -> Result<Course, ApiError> {
    let course = ctx.scoped(state.store.find_course(id).await?)?;
    if course.kind != kind {
        return Err(ApiError::not_found(format!("{} not found", kind.label())));
    }
    Ok(course)
}

async fn course_input(state: &AppState, ctx: &OrgContext, body: CourseRequest) -> Result<CourseInput, ApiError> {
    let category_id = match body.category {
        Some(uuid) => {
            let category = state
                .store
                .find_category(uuid)
                .await?
                .filter(|c| c.is_visible_to(ctx.organization_id()))
                .ok_or_else(|| ApiError::field("category", "The selected category is invalid."))?;
            Some(category.id)
        }
        None => None,
    };

    Ok(CourseInput {
        title: body.title.trim().to_string(),
        description: body.description,
        category_id,
        published: body.published,
    })
}

pub async fn list(
    State(state): State<AppState>,
    ctx: OrgContext,
    Extension(kind): Extension<CourseKind>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<Course>> {
    ctx.require(Capability::ViewContent)?;
    let window = query.window(&state.config.api);

    let (courses, total) = state
        .store
        .list_courses(ctx.organization_id(), kind, window.limit(), window.offset())
        .await?;
    Ok(ApiResponse::success(Page::new(courses, window, total)))
}

pub async fn show(
    State(state): State<AppState>,
    ctx: OrgContext,
    Extension(kind): Extension<CourseKind>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Course> {
    ctx.require(Capability::ViewContent)?;
    let course = load_course(&state, &ctx, kind, id).await?;
    Ok(ApiResponse::success(course))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: OrgContext,
    Extension(kind): Extension<CourseKind>,
    ValidatedJson(body): ValidatedJson<CourseRequest>,
) -> ApiResult<Course> {
    ctx.require(kind.manage_capability())?;
    let input = course_input(&state, &ctx, body).await?;

    let course = state.store.create_course(ctx.organization_id(), kind, &input).await?;
    tracing::info!("{} {} created in organization {}", kind.label(), course.uuid, ctx.organization_id());
    Ok(ApiResponse::created(course).with_message(format!("{} created", kind.label())))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: OrgContext,
    Extension(kind): Extension<CourseKind>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(body): ValidatedJson<CourseRequest>,
) -> ApiResult<Course> {
    ctx.require(kind.manage_capability())?;
    let course = load_course(&state, &ctx, kind, id).await?;
    let input = course_input(&state, &ctx, body).await?;

    let course = state.store.update_course(course.id, &input).await?;
    Ok(ApiResponse::success(course).with_message(format!("{} updated", kind.label())))
}

/// Deleting a course removes its sections, objectives, chapters and sub-chapters
pub async fn destroy(
    State(state): State<AppState>,
    ctx: OrgContext,
    Extension(kind): Extension<CourseKind>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    ctx.require(kind.manage_capability())?;
    let course = load_course(&state, &ctx, kind, id).await?;

    state.store.delete_course(course.id).await?;
    tracing::info!("{} {} deleted", kind.label(), course.uuid);
    Ok(ApiResponse::message(format!("{} deleted", kind.label())))
}
