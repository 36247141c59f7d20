use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::not_blank;
use crate::app::AppState;
use crate::database::models::Subscription;
use crate::error::ApiError;
use crate::guard::{Capability, OrgContext};
use crate::middleware::{ApiPath, ApiResponse, ApiResult, ValidatedJson};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", get(list))
        .route("/subscriptions/checkout", post(checkout))
        .route("/subscriptions/:id/cancel", post(cancel))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CheckoutRequest {
    #[validate(custom(function = "not_blank"))]
    pub plan: String,
}

pub async fn list(State(state): State<AppState>, ctx: OrgContext) -> ApiResult<Vec<Subscription>> {
    ctx.require(Capability::ManageSubscriptions)?;
    let subscriptions = state.store.list_subscriptions(ctx.organization_id()).await?;
    Ok(ApiResponse::success(subscriptions))
}

/// Start a hosted checkout for `plan`. The subscription stays pending until the
/// provider confirms payment.
pub async fn checkout(
    State(state): State<AppState>,
    ctx: OrgContext,
    ValidatedJson(body): ValidatedJson<CheckoutRequest>,
) -> ApiResult<Subscription> {
    ctx.require(Capability::ManageSubscriptions)?;
    let plan = body.plan.trim();

    if !state.payments.supports_plan(plan) {
        return Err(ApiError::field("plan", "The selected plan is invalid."));
    }
    if let Some(active) = state.store.active_subscription(ctx.organization_id()).await? {
        tracing::debug!("Organization {} already subscribed via {}", ctx.organization_id(), active.uuid);
        return Err(ApiError::conflict("Organization already has an active subscription"));
    }

    let organization = state
        .store
        .find_organization(ctx.organization_id())
        .await?
        .ok_or_else(|| ApiError::not_found("Organization not found"))?;

    let session = state.payments.create_checkout_session(&organization, plan).await?;
    let subscription = state
        .store
        .create_subscription(ctx.organization_id(), plan, &session.external_id, &session.url)
        .await?;

    tracing::info!(
        "Checkout {} opened for organization {} on plan '{}'",
        subscription.uuid,
        organization.uuid,
        plan
    );
    Ok(ApiResponse::created(subscription).with_message("Checkout session created"))
}

/// Pending or active subscriptions only; the provider is told first
pub async fn cancel(State(state): State<AppState>, ctx: OrgContext, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Subscription> {
    let subscription = ctx.authorize(Capability::ManageSubscriptions, state.store.find_subscription(id).await?)?;
    if !subscription.is_cancelable() {
        return Err(ApiError::conflict("Subscription is already canceled"));
    }

    if let Some(external_id) = subscription.external_id.as_deref() {
        state.payments.cancel_subscription(external_id).await?;
    }

    let subscription = state.store.cancel_subscription(subscription.id).await?;
    tracing::info!("Subscription {} canceled", subscription.uuid);
    Ok(ApiResponse::success(subscription).with_message("Subscription canceled"))
}
