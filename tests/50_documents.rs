mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use lms_api::guard::Role;
use lms_api::testing::TestContext;

const PDF: &[u8] = b"%PDF-1.4\n1 0 obj << >> endobj\ntrailer << >>\n%%EOF\n";

async fn section(ctx: &TestContext, token: &str) -> Result<Uuid> {
    let course = ctx.post(token, "/organization/courses", json!({ "title": "Course" })).await?;
    let section = ctx
        .post(token, &format!("/organization/courses/{}/sections", course.id()), json!({ "title": "Part" }))
        .await?;
    Ok(section.id())
}

#[tokio::test]
async fn pdf_upload_is_stored_and_listed() -> Result<()> {
    let ctx = common::context();
    let (_, token) = common::tenant(&ctx, "Acme").await;

    let res = ctx
        .upload(&token, "/organization/documents?category=pdf", "handbook.pdf", "application/pdf", PDF, Some("Handbook"))
        .await?;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.body["message"], "Document uploaded");
    assert_eq!(res.data()["title"], "Handbook");
    assert_eq!(res.data()["category"], "pdf");
    assert_eq!(res.data()["size_bytes"], PDF.len());
    assert_eq!(res.data()["original_name"], "handbook.pdf");
    assert!(res.data().get("path").is_none());
    assert_eq!(ctx.storage.len().await, 1);

    let res = ctx.get(&token, "/organization/documents").await?;
    assert_eq!(res.data()["total"], 1);
    assert_eq!(res.data()["items"][0]["title"], "Handbook");
    Ok(())
}

#[tokio::test]
async fn title_defaults_to_the_file_name() -> Result<()> {
    let ctx = common::context();
    let (_, token) = common::tenant(&ctx, "Acme").await;

    let res = ctx
        .upload(&token, "/organization/documents?category=document", "notes.txt", "text/plain", b"hello", None)
        .await?;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.data()["title"], "notes.txt");
    Ok(())
}

#[tokio::test]
async fn category_is_required_and_known() -> Result<()> {
    let ctx = common::context();
    let (_, token) = common::tenant(&ctx, "Acme").await;

    for uri in ["/organization/documents", "/organization/documents?category=spreadsheet"] {
        let res = ctx.upload(&token, uri, "handbook.pdf", "application/pdf", PDF, None).await?;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
        assert!(res.body["errors"]["category"].is_array());
    }
    assert_eq!(ctx.storage.len().await, 0);
    Ok(())
}

#[tokio::test]
async fn files_must_match_their_category() -> Result<()> {
    let ctx = common::context();
    let (_, token) = common::tenant(&ctx, "Acme").await;

    let res = ctx
        .upload(&token, "/organization/documents?category=image", "handbook.pdf", "application/pdf", PDF, None)
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["errors"]["file"].is_array());

    let big = vec![0u8; 2 * 1024 * 1024 + 128 * 1024];
    let res = ctx
        .upload(&token, "/organization/documents?category=image", "huge.png", "image/png", &big, None)
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["errors"]["file"].is_array());

    let res = ctx
        .upload(&token, "/organization/documents?category=pdf", "empty.pdf", "application/pdf", b"", None)
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["errors"]["file"].is_array());

    assert_eq!(ctx.storage.len().await, 0);
    Ok(())
}

#[tokio::test]
async fn referenced_documents_cannot_be_deleted() -> Result<()> {
    let ctx = common::context();
    let (_, token) = common::tenant(&ctx, "Acme").await;

    let document = ctx
        .upload(&token, "/organization/documents?category=pdf", "handbook.pdf", "application/pdf", PDF, None)
        .await?;
    let section = section(&ctx, &token).await?;
    let chapter = ctx
        .post(
            &token,
            &format!("/organization/sections/{}/chapters", section),
            json!({ "title": "Reading", "document": document.id() }),
        )
        .await?;
    assert_eq!(chapter.status, StatusCode::CREATED, "{}", chapter.body);
    assert_eq!(chapter.data()["document"], document.id().to_string());

    let uri = format!("/organization/documents/{}", document.id());
    let res = ctx.delete(&token, &uri).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["data"]["count"], 1);
    assert_eq!(ctx.storage.len().await, 1);

    let res = ctx.delete(&token, &format!("/organization/chapters/{}", chapter.id())).await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = ctx.delete(&token, &uri).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(ctx.storage.len().await, 0);

    let res = ctx.get(&token, &uri).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn documents_are_tenant_scoped() -> Result<()> {
    let ctx = common::context();
    let (acme, a) = common::tenant(&ctx, "Org A").await;
    let (_, b) = common::tenant(&ctx, "Org B").await;
    let student = common::member(&ctx, &acme, "Stu Dent", Role::Student).await;

    let document = ctx
        .upload(&a, "/organization/documents?category=pdf", "handbook.pdf", "application/pdf", PDF, None)
        .await?;
    let uri = format!("/organization/documents/{}", document.id());

    let res = ctx.get(&b, &uri).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    let res = ctx.delete(&b, &uri).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    // Foreign documents cannot be attached to chapters either
    let section = section(&ctx, &b).await?;
    let res = ctx
        .post(
            &b,
            &format!("/organization/sections/{}/chapters", section),
            json!({ "title": "Borrowed", "document": document.id() }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["errors"]["document"][0], "The selected document is invalid.");

    let res = ctx
        .upload(&student, "/organization/documents?category=pdf", "mine.pdf", "application/pdf", PDF, None)
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = ctx.get(&student, &uri).await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}
