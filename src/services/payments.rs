use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

use crate::config::PaymentsConfig;
use crate::database::models::Organization;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Unknown plan '{0}'")]
    UnknownPlan(String),

    #[error("Payment provider is not configured")]
    NotConfigured,

    #[error("Payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid payment provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub external_id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Whether `plan` has a configured price
    fn supports_plan(&self, plan: &str) -> bool;

    async fn create_checkout_session(&self, organization: &Organization, plan: &str) -> Result<CheckoutSession, PaymentError>;

    async fn cancel_subscription(&self, external_id: &str) -> Result<(), PaymentError>;
}

/// Stripe Checkout over the REST API (form-encoded requests, bearer secret key)
#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: Url,
    secret_key: String,
    success_url: String,
    cancel_url: String,
    prices: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: String,
}

impl StripeGateway {
    pub fn new(config: &PaymentsConfig) -> Result<Self, PaymentError> {
        let mut base = config.api_base.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: Url::parse(&base)?,
            secret_key: config.secret_key.clone(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
            prices: config.prices.clone(),
        })
    }

    fn ensure_configured(&self) -> Result<(), PaymentError> {
        if self.secret_key.is_empty() {
            return Err(PaymentError::NotConfigured);
        }
        Ok(())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<StripeErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        Err(PaymentError::Rejected { status: status.as_u16(), message })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn supports_plan(&self, plan: &str) -> bool {
        self.prices.contains_key(plan)
    }

    async fn create_checkout_session(&self, organization: &Organization, plan: &str) -> Result<CheckoutSession, PaymentError> {
        let price = self
            .prices
            .get(plan)
            .ok_or_else(|| PaymentError::UnknownPlan(plan.to_string()))?;
        self.ensure_configured()?;

        let organization_ref = organization.uuid.to_string();
        let form = [
            ("mode", "subscription"),
            ("line_items[0][price]", price.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", self.success_url.as_str()),
            ("cancel_url", self.cancel_url.as_str()),
            ("client_reference_id", organization_ref.as_str()),
            ("metadata[plan]", plan),
        ];

        let response = self
            .client
            .post(self.api_base.join("checkout/sessions")?)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;
        let session: StripeSession = Self::check(response).await?.json().await?;

        tracing::info!("Created checkout session {} for organization {}", session.id, organization.uuid);
        Ok(CheckoutSession {
            url: session.url.unwrap_or_default(),
            external_id: session.id,
        })
    }

    async fn cancel_subscription(&self, external_id: &str) -> Result<(), PaymentError> {
        self.ensure_configured()?;

        // A checkout that never completed is expired; a live subscription is deleted
        let request = if external_id.starts_with("cs_") {
            self.client
                .post(self.api_base.join(&format!("checkout/sessions/{}/expire", external_id))?)
        } else {
            self.client
                .delete(self.api_base.join(&format!("subscriptions/{}", external_id))?)
        };

        let response = request.bearer_auth(&self.secret_key).send().await?;
        Self::check(response).await?;
        tracing::info!("Canceled {} with the payment provider", external_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use chrono::Utc;
    use uuid::Uuid;

    fn organization() -> Organization {
        Organization {
            id: 1,
            uuid: Uuid::new_v4(),
            name: "Acme".into(),
            owner_user_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn plans_come_from_price_table() {
        let gateway = StripeGateway::new(&AppConfig::development().payments).unwrap();
        assert!(gateway.supports_plan("basic"));
        assert!(!gateway.supports_plan("enterprise"));
    }

    #[tokio::test]
    async fn unknown_plan_fails_before_network() {
        let gateway = StripeGateway::new(&AppConfig::development().payments).unwrap();
        let err = gateway.create_checkout_session(&organization(), "enterprise").await.unwrap_err();
        assert!(matches!(err, PaymentError::UnknownPlan(plan) if plan == "enterprise"));
    }

    #[tokio::test]
    async fn missing_secret_is_reported() {
        let gateway = StripeGateway::new(&AppConfig::development().payments).unwrap();
        let err = gateway.create_checkout_session(&organization(), "basic").await.unwrap_err();
        assert!(matches!(err, PaymentError::NotConfigured));
    }
}
