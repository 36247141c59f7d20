//! In-process test harness: the full router over the in-memory store, with
//! recording stand-ins for the payment, storage and notification collaborators.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use crate::app::{app, AppState};
use crate::auth::{generate_jwt, Claims};
use crate::config::AppConfig;
use crate::database::models::{Organization, UserRecord};
use crate::database::MemoryStore;
use crate::guard::{Role, RolePolicy};
use crate::services::payments::{CheckoutSession, PaymentError, PaymentGateway};
use crate::services::storage::{object_key, FileCategory, FileStorage, StorageError, StoredFile, Upload};
use crate::services::{Notifier, NotifyError, TicketNotice};

/// Checkout sessions that never leave the process
#[derive(Debug, Default)]
pub struct RecordingGateway {
    checkouts: Mutex<Vec<(Uuid, String)>>,
    cancellations: Mutex<Vec<String>>,
}

impl RecordingGateway {
    pub const PLANS: [&'static str; 2] = ["basic", "pro"];

    /// `(organization, plan)` for every checkout opened
    pub async fn checkouts(&self) -> Vec<(Uuid, String)> {
        self.checkouts.lock().await.clone()
    }

    pub async fn cancellations(&self) -> Vec<String> {
        self.cancellations.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    fn supports_plan(&self, plan: &str) -> bool {
        Self::PLANS.contains(&plan)
    }

    async fn create_checkout_session(&self, organization: &Organization, plan: &str) -> Result<CheckoutSession, PaymentError> {
        if !self.supports_plan(plan) {
            return Err(PaymentError::UnknownPlan(plan.to_string()));
        }
        let mut checkouts = self.checkouts.lock().await;
        checkouts.push((organization.uuid, plan.to_string()));
        let external_id = format!("cs_test_{}", checkouts.len());
        Ok(CheckoutSession {
            url: format!("https://checkout.test/{}", external_id),
            external_id,
        })
    }

    async fn cancel_subscription(&self, external_id: &str) -> Result<(), PaymentError> {
        self.cancellations.lock().await.push(external_id.to_string());
        Ok(())
    }
}

/// Keeps every notice with its recipient
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Uuid, TicketNotice)>>,
}

impl RecordingNotifier {
    /// Notices are delivered from a background task; poll until `count` arrive or a second passes
    pub async fn wait_for(&self, count: usize) -> Vec<(Uuid, TicketNotice)> {
        for _ in 0..100 {
            {
                let sent = self.sent.lock().await;
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: &UserRecord, notice: &TicketNotice) -> Result<(), NotifyError> {
        self.sent.lock().await.push((recipient.uuid, notice.clone()));
        Ok(())
    }
}

/// Object storage held in a map
#[derive(Debug, Default)]
pub struct MemoryFileStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStorage {
    pub async fn contains(&self, path: &str) -> bool {
        self.files.lock().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn store(&self, category: FileCategory, upload: Upload) -> Result<StoredFile, StorageError> {
        if upload.data.is_empty() {
            return Err(StorageError::Empty);
        }
        let key = object_key(category, &upload);
        let size = upload.data.len() as i64;
        self.files.lock().await.insert(key.clone(), upload.data);

        Ok(StoredFile {
            url: format!("memory://{}", key),
            path: key,
            size,
            name: upload.original_name,
            mime_type: upload.mime_type,
        })
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        self.files.lock().await.remove(path);
        Ok(())
    }
}

/// Organization plus its owner
#[derive(Debug, Clone)]
pub struct TestTenant {
    pub organization: Organization,
    pub owner: UserRecord,
}

/// Decoded envelope and status of one in-process request
#[derive(Debug, Clone)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// `data` of a success envelope
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// Public id found at `data.id`
    pub fn id(&self) -> Uuid {
        self.body["data"]["id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("response has no data.id: {}", self.body))
    }
}

pub struct TestContext {
    pub store: MemoryStore,
    pub config: Arc<AppConfig>,
    pub payments: Arc<RecordingGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub storage: Arc<MemoryFileStorage>,
    router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        let mut config = AppConfig::development();
        config.security.jwt_secret = "test-secret".to_string();
        config.api.enable_request_logging = false;
        let config = Arc::new(config);

        let store = MemoryStore::new();
        let payments = Arc::new(RecordingGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let storage = Arc::new(MemoryFileStorage::default());

        let state = AppState {
            config: config.clone(),
            policy: Arc::new(RolePolicy),
            store: Arc::new(store.clone()),
            storage: storage.clone(),
            payments: payments.clone(),
            notifier: notifier.clone(),
        };

        Self {
            store,
            config,
            payments,
            notifier,
            storage,
            router: app(state),
        }
    }

    /// Organization owned by a fresh organization_owner user
    pub async fn seed_tenant(&self, name: &str) -> TestTenant {
        let organization = self.store.seed_organization(name).await;
        let owner = self
            .store
            .seed_user(&format!("{} Owner", name), Role::OrganizationOwner, None)
            .await;
        self.store.set_owner(organization.id, owner.id).await;
        TestTenant { organization, owner }
    }

    /// User attached to the organization through the staff link
    pub async fn seed_member(&self, tenant: &TestTenant, name: &str, role: Role) -> UserRecord {
        self.store.seed_user(name, role, Some(tenant.organization.id)).await
    }

    /// Instructor attached only through the instructors table
    pub async fn seed_instructor(&self, tenant: &TestTenant, name: &str) -> UserRecord {
        let user = self.store.seed_user(name, Role::Instructor, None).await;
        self.store.link_instructor(user.id, tenant.organization.id).await;
        user
    }

    pub fn token_for(&self, user: &UserRecord) -> String {
        generate_jwt(
            &Claims::new(user.uuid, self.config.security.jwt_expiry_hours),
            &self.config.security.jwt_secret,
        )
        .unwrap_or_else(|e| panic!("could not mint token: {}", e))
    }

    pub async fn send(&self, request: Request<Body>) -> anyhow::Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(TestResponse { status, body })
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> anyhow::Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn get(&self, token: &str, uri: &str) -> anyhow::Result<TestResponse> {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, token: &str, uri: &str, body: Value) -> anyhow::Result<TestResponse> {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, token: &str, uri: &str, body: Value) -> anyhow::Result<TestResponse> {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, token: &str, uri: &str) -> anyhow::Result<TestResponse> {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Multipart POST with a single `file` part and an optional `title`
    pub async fn upload(
        &self,
        token: &str,
        uri: &str,
        file_name: &str,
        mime_type: &str,
        data: &[u8],
        title: Option<&str>,
    ) -> anyhow::Result<TestResponse> {
        let boundary = format!("lms-test-{}", Uuid::new_v4().simple());
        let mut body = Vec::new();
        if let Some(title) = title {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{}\r\n",
                    boundary, title
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                boundary, file_name, mime_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))?;
        self.send(request).await
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
