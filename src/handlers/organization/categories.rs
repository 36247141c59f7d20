use axum::{
    extract::State,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::not_blank;
use crate::app::AppState;
use crate::database::models::category::{normalize_name, Category};
use crate::database::repository::CategoryRepository;
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::guard::{Capability, OrgContext};
use crate::middleware::{ApiPath, ApiResponse, ApiResult, ValidatedJson};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/:id", put(update).delete(destroy))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CategoryRequest {
    #[validate(
        custom(function = "not_blank"),
        length(max = 80, message = "The name may not be greater than 80 characters.")
    )]
    pub name: String,
}

fn name_taken() -> ApiError {
    ApiError::field("name", "The name has already been taken.")
}

/// Losing the race against a concurrent insert reads the same as the pre-check
fn name_conflict(err: DatabaseError) -> ApiError {
    match err {
        DatabaseError::UniqueViolation(_) => name_taken(),
        other => other.into(),
    }
}

/// GET /organization/categories - global categories plus the organization's own
pub async fn list(State(state): State<AppState>, ctx: OrgContext) -> ApiResult<Vec<Category>> {
    ctx.require(Capability::ViewContent)?;
    let categories = state.store.list_categories(ctx.organization_id()).await?;
    Ok(ApiResponse::success(categories))
}

/// POST /organization/categories
pub async fn create(
    State(state): State<AppState>,
    ctx: OrgContext,
    ValidatedJson(body): ValidatedJson<CategoryRequest>,
) -> ApiResult<Category> {
    ctx.require(Capability::ManageCategories)?;
    let name = body.name.trim();

    if state.store.category_name_taken(ctx.organization_id(), name, None).await? {
        tracing::debug!(
            "Category '{}' already exists in organization {}",
            normalize_name(name),
            ctx.organization_id()
        );
        return Err(name_taken());
    }

    let category = state
        .store
        .create_category(ctx.organization_id(), name)
        .await
        .map_err(name_conflict)?;

    tracing::info!("Category {} created in organization {}", category.uuid, ctx.organization_id());
    Ok(ApiResponse::created(category).with_message("Category created"))
}

/// PUT /organization/categories/:id - global categories are not editable by tenants
pub async fn update(
    State(state): State<AppState>,
    ctx: OrgContext,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(body): ValidatedJson<CategoryRequest>,
) -> ApiResult<Category> {
    let category = ctx.authorize(Capability::ManageCategories, state.store.find_category(id).await?)?;
    let name = body.name.trim();

    if state
        .store
        .category_name_taken(ctx.organization_id(), name, Some(category.id))
        .await?
    {
        return Err(name_taken());
    }

    let category = state
        .store
        .rename_category(category.id, name)
        .await
        .map_err(name_conflict)?;
    Ok(ApiResponse::success(category).with_message("Category updated"))
}

/// DELETE /organization/categories/:id - refused while courses still use it
pub async fn destroy(State(state): State<AppState>, ctx: OrgContext, ApiPath(id): ApiPath<Uuid>) -> ApiResult<()> {
    let category = ctx.authorize(Capability::ManageCategories, state.store.find_category(id).await?)?;

    let count = state.store.count_category_courses(category.id).await?;
    if count > 0 {
        tracing::debug!("Category {} still used by {} courses", category.uuid, count);
        return Err(ApiError::conflict_with_count(
            "Category is still assigned to courses and cannot be deleted",
            count,
        ));
    }

    state.store.delete_category(category.id).await?;
    Ok(ApiResponse::message("Category deleted"))
}
