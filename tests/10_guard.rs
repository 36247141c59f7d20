mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use lms_api::auth::{generate_jwt, Claims};
use lms_api::guard::Role;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let ctx = common::context();

    let res = ctx.request(Method::GET, "/health", None, None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.data()["database"], "memory");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() -> Result<()> {
    let ctx = common::context();

    let res = ctx.request(Method::GET, "/auth/whoami", None, None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["success"], false);

    let res = ctx.get("not-a-jwt", "/organization/categories").await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let forged = generate_jwt(&Claims::new(Uuid::new_v4(), 1), "some-other-secret")?;
    let res = ctx.get(&forged, "/organization/categories").await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    // Well-signed token for a user that does not exist
    let ghost = generate_jwt(&Claims::new(Uuid::new_v4(), 1), &ctx.config.security.jwt_secret)?;
    let res = ctx.get(&ghost, "/auth/whoami").await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Unknown user");
    Ok(())
}

#[tokio::test]
async fn actor_without_organization_is_refused_everywhere() -> Result<()> {
    let ctx = common::context();
    let loner = ctx.store.seed_user("Loner", Role::OrganizationOwner, None).await;
    let token = ctx.token_for(&loner);

    let res = ctx.get(&token, "/auth/whoami").await?;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.data()["membership"].is_null());
    assert!(res.data()["organization"].is_null());

    let attempts = [
        (Method::POST, "/organization/categories", Some(json!({ "name": "Sales" }))),
        (Method::POST, "/organization/courses", Some(json!({ "title": "Intro" }))),
        (Method::POST, "/organization/sessions", Some(json!({ "title": "Live" }))),
        (Method::POST, "/organization/quizzes", Some(json!({ "title": "Quiz" }))),
        (Method::POST, "/organization/tickets", Some(json!({ "subject": "Help", "message": "Please" }))),
        (Method::POST, "/organization/subscriptions/checkout", Some(json!({ "plan": "basic" }))),
        (Method::GET, "/organization/courses", None),
    ];
    for (method, uri, body) in attempts {
        let res = ctx.request(method.clone(), uri, Some(&token), body).await?;
        assert_eq!(res.status, StatusCode::FORBIDDEN, "{} {}", method, uri);
        assert_eq!(res.body["message"], "No organization is associated with this account");
    }
    Ok(())
}

#[tokio::test]
async fn membership_resolution_order() -> Result<()> {
    let ctx = common::context();
    let (acme, owner_token) = common::tenant(&ctx, "Acme").await;
    let staff_token = common::member(&ctx, &acme, "Stu Dent", Role::Student).await;
    let instructor = ctx.seed_instructor(&acme, "Ian Structor").await;
    let instructor_token = ctx.token_for(&instructor);

    let res = ctx.get(&owner_token, "/auth/whoami").await?;
    assert_eq!(res.data()["membership"], "direct_owner");
    assert_eq!(res.data()["organization"]["id"], acme.organization.uuid.to_string());
    assert_eq!(res.data()["capabilities"].as_array().map(Vec::len), Some(11));

    let res = ctx.get(&staff_token, "/auth/whoami").await?;
    assert_eq!(res.data()["membership"], "staff_member");
    assert_eq!(res.data()["capabilities"], json!(["view_content", "take_quizzes", "create_tickets"]));

    let res = ctx.get(&instructor_token, "/auth/whoami").await?;
    assert_eq!(res.data()["membership"], "instructor");
    assert_eq!(res.data()["organization"]["name"], "Acme");
    Ok(())
}

#[tokio::test]
async fn other_tenants_resources_look_missing() -> Result<()> {
    let ctx = common::context();
    let (_, a_token) = common::tenant(&ctx, "Org A").await;
    let (_, b_token) = common::tenant(&ctx, "Org B").await;

    let created = ctx.post(&a_token, "/organization/courses", json!({ "title": "Onboarding" })).await?;
    assert_eq!(created.status, StatusCode::CREATED);
    let uri = format!("/organization/courses/{}", created.id());

    let res = ctx.get(&b_token, &uri).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "Course not found");

    let res = ctx.put(&b_token, &uri, json!({ "title": "Hijacked" })).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = ctx.delete(&b_token, &uri).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    // A random id reads the same as a foreign one
    let res = ctx.get(&b_token, &format!("/organization/courses/{}", Uuid::new_v4())).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "Course not found");

    let res = ctx.get(&a_token, &uri).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["title"], "Onboarding");
    Ok(())
}

#[tokio::test]
async fn capabilities_gate_mutations() -> Result<()> {
    let ctx = common::context();
    let (acme, _) = common::tenant(&ctx, "Acme").await;
    let student = ctx.seed_member(&acme, "Stu Dent", Role::Student).await;
    let token = ctx.token_for(&student);

    let res = ctx.post(&token, "/organization/courses", json!({ "title": "Mine" })).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["message"], "Missing capability 'manage_courses'");

    ctx.store.grant(student.id, "manage_courses").await;
    ctx.store.grant(student.id, "launch_rockets").await;

    let res = ctx.post(&token, "/organization/courses", json!({ "title": "Mine" })).await?;
    assert_eq!(res.status, StatusCode::CREATED);

    // Sessions need their own capability
    let res = ctx.post(&token, "/organization/sessions", json!({ "title": "Live" })).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn courses_and_sessions_do_not_mix() -> Result<()> {
    let ctx = common::context();
    let (_, token) = common::tenant(&ctx, "Acme").await;

    let course = ctx.post(&token, "/organization/courses", json!({ "title": "Course" })).await?;
    let session = ctx.post(&token, "/organization/sessions", json!({ "title": "Session" })).await?;
    assert_eq!(course.data()["kind"], "course");
    assert_eq!(session.data()["kind"], "session");

    let res = ctx.get(&token, &format!("/organization/sessions/{}", course.id())).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = ctx.get(&token, "/organization/sessions").await?;
    assert_eq!(res.data()["total"], 1);
    assert_eq!(res.data()["items"][0]["title"], "Session");
    Ok(())
}

#[tokio::test]
async fn malformed_ids_are_not_found() -> Result<()> {
    let ctx = common::context();
    let (_, token) = common::tenant(&ctx, "Acme").await;

    let res = ctx.get(&token, "/organization/courses/42").await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["success"], false);
    Ok(())
}
