#![allow(dead_code)]

use std::sync::Once;

use lms_api::guard::Role;
use lms_api::testing::{TestContext, TestTenant};

static TRACING: Once = Once::new();

/// Quiet by default; set RUST_LOG to see handler logs while debugging a test
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn context() -> TestContext {
    init_tracing();
    TestContext::new()
}

/// Tenant plus a bearer token for its owner
pub async fn tenant(ctx: &TestContext, name: &str) -> (TestTenant, String) {
    let tenant = ctx.seed_tenant(name).await;
    let token = ctx.token_for(&tenant.owner);
    (tenant, token)
}

/// Staff member of `tenant` with the given role and a token
pub async fn member(ctx: &TestContext, tenant: &TestTenant, name: &str, role: Role) -> String {
    let user = ctx.seed_member(tenant, name, role).await;
    ctx.token_for(&user)
}
