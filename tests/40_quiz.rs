mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use lms_api::guard::Role;
use lms_api::testing::TestContext;

struct Quiz {
    id: Uuid,
    multiple_choice: Uuid,
    mc_correct: Uuid,
    true_false: Uuid,
    tf_wrong: Uuid,
    free_text: Uuid,
}

fn option_id(question: &Value, correct: bool) -> Uuid {
    question["options"]
        .as_array()
        .and_then(|options| options.iter().find(|o| o["is_correct"] == correct))
        .and_then(|o| o["id"].as_str())
        .and_then(|id| id.parse().ok())
        .unwrap_or_else(|| panic!("no option with is_correct={} in {}", correct, question))
}

async fn quiz_with_questions(ctx: &TestContext, token: &str) -> Result<Quiz> {
    let quiz = ctx.post(token, "/organization/quizzes", json!({ "title": "Basics", "pass_mark": 50 })).await?;
    assert_eq!(quiz.status, StatusCode::CREATED);
    let questions = format!("/organization/quizzes/{}/questions", quiz.id());

    let mc = ctx
        .post(
            token,
            &questions,
            json!({
                "kind": "multiple_choice",
                "prompt": "2 + 2?",
                "points": 2,
                "options": [
                    { "label": "3", "is_correct": false },
                    { "label": "4", "is_correct": true },
                    { "label": "5", "is_correct": false }
                ]
            }),
        )
        .await?;
    assert_eq!(mc.status, StatusCode::CREATED, "{}", mc.body);

    let tf = ctx
        .post(
            token,
            &questions,
            json!({
                "kind": "true_false",
                "prompt": "The sky is green",
                "points": 1,
                "options": [
                    { "label": "True", "is_correct": false },
                    { "label": "False", "is_correct": true }
                ]
            }),
        )
        .await?;
    assert_eq!(tf.status, StatusCode::CREATED, "{}", tf.body);

    let ft = ctx
        .post(token, &questions, json!({ "kind": "free_text", "prompt": "Explain addition", "points": 3 }))
        .await?;
    assert_eq!(ft.status, StatusCode::CREATED, "{}", ft.body);

    Ok(Quiz {
        id: quiz.id(),
        multiple_choice: mc.id(),
        mc_correct: option_id(mc.data(), true),
        true_false: tf.id(),
        tf_wrong: option_id(tf.data(), false),
        free_text: ft.id(),
    })
}

fn answer_for<'a>(answers: &'a Value, question: Uuid) -> &'a Value {
    answers
        .as_array()
        .and_then(|answers| answers.iter().find(|a| a["question"] == question.to_string()))
        .unwrap_or_else(|| panic!("no answer for {} in {}", question, answers))
}

#[tokio::test]
async fn submit_then_manual_grade_derives_status() -> Result<()> {
    let ctx = common::context();
    let (acme, owner) = common::tenant(&ctx, "Acme").await;
    let student = common::member(&ctx, &acme, "Stu Dent", Role::Student).await;
    let grader = common::member(&ctx, &acme, "Ian Structor", Role::Instructor).await;
    let quiz = quiz_with_questions(&ctx, &owner).await?;

    let attempt = ctx.post(&student, &format!("/organization/quizzes/{}/attempts", quiz.id), json!({})).await?;
    assert_eq!(attempt.status, StatusCode::CREATED);
    assert_eq!(attempt.data()["status"], "in_progress");
    let attempt_uri = format!("/organization/attempts/{}", attempt.id());

    let res = ctx
        .put(
            &student,
            &format!("{}/answers", attempt_uri),
            json!({ "answers": [
                { "question": quiz.multiple_choice, "option": quiz.mc_correct },
                { "question": quiz.true_false, "option": quiz.tf_wrong },
                { "question": quiz.free_text, "text": "You count on" }
            ]}),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.data().as_array().map(Vec::len), Some(3));

    // Grading before submission is a conflict
    let free_answer = answer_for(res.data(), quiz.free_text)["id"].as_str().unwrap_or_default().to_string();
    let grade_uri = format!("{}/answers/{}/grade", attempt_uri, free_answer);
    let res = ctx.post(&grader, &grade_uri, json!({ "is_correct": true, "points": 3 })).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    let res = ctx.post(&student, &format!("{}/submit", attempt_uri), json!({})).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["status"], "submitted");
    assert_eq!(res.data()["score"], 2);
    let answers = &res.data()["answers"];
    assert_eq!(answer_for(answers, quiz.multiple_choice)["is_correct"], true);
    assert_eq!(answer_for(answers, quiz.true_false)["is_correct"], false);
    assert!(answer_for(answers, quiz.free_text)["is_correct"].is_null());

    // Out of range points
    let res = ctx.post(&grader, &grade_uri, json!({ "is_correct": true, "points": 4 })).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["errors"]["points"].is_array());

    let res = ctx
        .post(&grader, &grade_uri, json!({ "is_correct": true, "points": 3, "feedback": "Nice" }))
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.data()["attempt"]["status"], "graded");
    assert_eq!(res.data()["attempt"]["score"], 5);
    assert_eq!(res.data()["answer"]["feedback"], "Nice");

    // Regrading stays graded and recomputes the score
    let res = ctx.post(&grader, &grade_uri, json!({ "is_correct": false, "points": 0 })).await?;
    assert_eq!(res.data()["attempt"]["status"], "graded");
    assert_eq!(res.data()["attempt"]["score"], 2);

    let res = ctx.get(&student, &attempt_uri).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["status"], "graded");
    Ok(())
}

#[tokio::test]
async fn objective_only_attempts_are_graded_on_submit() -> Result<()> {
    let ctx = common::context();
    let (acme, owner) = common::tenant(&ctx, "Acme").await;
    let student = common::member(&ctx, &acme, "Stu Dent", Role::Student).await;
    let quiz = quiz_with_questions(&ctx, &owner).await?;

    let attempt = ctx.post(&student, &format!("/organization/quizzes/{}/attempts", quiz.id), json!({})).await?;
    let attempt_uri = format!("/organization/attempts/{}", attempt.id());
    ctx.put(
        &student,
        &format!("{}/answers", attempt_uri),
        json!({ "answers": [{ "question": quiz.multiple_choice, "option": quiz.mc_correct }] }),
    )
    .await?;

    let res = ctx.post(&student, &format!("{}/submit", attempt_uri), json!({})).await?;
    assert_eq!(res.data()["status"], "graded");
    assert_eq!(res.data()["score"], 2);
    Ok(())
}

#[tokio::test]
async fn empty_submission_is_vacuously_graded() -> Result<()> {
    let ctx = common::context();
    let (acme, owner) = common::tenant(&ctx, "Acme").await;
    let student = common::member(&ctx, &acme, "Stu Dent", Role::Student).await;
    let quiz = quiz_with_questions(&ctx, &owner).await?;

    let attempt = ctx.post(&student, &format!("/organization/quizzes/{}/attempts", quiz.id), json!({})).await?;
    let res = ctx
        .post(&student, &format!("/organization/attempts/{}/submit", attempt.id()), json!({}))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["status"], "graded");
    assert_eq!(res.data()["score"], 0);
    Ok(())
}

#[tokio::test]
async fn submitted_attempts_are_frozen() -> Result<()> {
    let ctx = common::context();
    let (acme, owner) = common::tenant(&ctx, "Acme").await;
    let student = common::member(&ctx, &acme, "Stu Dent", Role::Student).await;
    let quiz = quiz_with_questions(&ctx, &owner).await?;

    let attempt = ctx.post(&student, &format!("/organization/quizzes/{}/attempts", quiz.id), json!({})).await?;
    let attempt_uri = format!("/organization/attempts/{}", attempt.id());
    ctx.post(&student, &format!("{}/submit", attempt_uri), json!({})).await?;

    let res = ctx.post(&student, &format!("{}/submit", attempt_uri), json!({})).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["message"], "Attempt has already been submitted");

    let res = ctx
        .put(
            &student,
            &format!("{}/answers", attempt_uri),
            json!({ "answers": [{ "question": quiz.free_text, "text": "late" }] }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn attempts_belong_to_their_owner() -> Result<()> {
    let ctx = common::context();
    let (acme, owner) = common::tenant(&ctx, "Acme").await;
    let student = common::member(&ctx, &acme, "Stu Dent", Role::Student).await;
    let classmate = common::member(&ctx, &acme, "Class Mate", Role::Student).await;
    let quiz = quiz_with_questions(&ctx, &owner).await?;

    let attempt = ctx.post(&student, &format!("/organization/quizzes/{}/attempts", quiz.id), json!({})).await?;
    let attempt_uri = format!("/organization/attempts/{}", attempt.id());

    let res = ctx.get(&classmate, &attempt_uri).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = ctx.post(&classmate, &format!("{}/submit", attempt_uri), json!({})).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    // Graders may look
    let res = ctx.get(&owner, &attempt_uri).await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn answers_must_match_the_quiz() -> Result<()> {
    let ctx = common::context();
    let (acme, owner) = common::tenant(&ctx, "Acme").await;
    let student = common::member(&ctx, &acme, "Stu Dent", Role::Student).await;
    let quiz = quiz_with_questions(&ctx, &owner).await?;

    let attempt = ctx.post(&student, &format!("/organization/quizzes/{}/attempts", quiz.id), json!({})).await?;
    let answers_uri = format!("/organization/attempts/{}/answers", attempt.id());

    let bad = [
        json!({ "answers": [{ "question": Uuid::new_v4(), "text": "?" }] }),
        json!({ "answers": [{ "question": quiz.true_false, "option": quiz.mc_correct }] }),
        json!({ "answers": [{ "question": quiz.free_text, "option": quiz.mc_correct }] }),
    ];
    for body in bad {
        let res = ctx.put(&student, &answers_uri, body.clone()).await?;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
        assert!(res.body["errors"]["answers"].is_array());
    }

    let res = ctx.put(&student, &answers_uri, json!({ "answers": [] })).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn question_rules_and_visibility() -> Result<()> {
    let ctx = common::context();
    let (acme, owner) = common::tenant(&ctx, "Acme").await;
    let student = common::member(&ctx, &acme, "Stu Dent", Role::Student).await;
    let quiz = quiz_with_questions(&ctx, &owner).await?;
    let questions = format!("/organization/quizzes/{}/questions", quiz.id);

    let res = ctx
        .post(
            &owner,
            &questions,
            json!({ "kind": "multiple_choice", "prompt": "Lonely", "points": 1, "options": [{ "label": "only", "is_correct": true }] }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["errors"]["options"].is_array());

    let res = ctx.post(&owner, &questions, json!({ "kind": "free_text", "prompt": "Zero", "points": 0 })).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["errors"]["points"].is_array());

    let res = ctx.post(&student, &questions, json!({ "kind": "free_text", "prompt": "Mine", "points": 1 })).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    // Takers do not see which option is correct
    let res = ctx.get(&student, &format!("/organization/quizzes/{}", quiz.id)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["questions"].as_array().map(Vec::len), Some(3));
    assert!(res.data()["questions"][0]["options"][0].get("is_correct").is_none());

    let res = ctx.get(&owner, &format!("/organization/quizzes/{}", quiz.id)).await?;
    assert!(res.data()["questions"][0]["options"][0]["is_correct"].is_boolean());

    let res = ctx.delete(&owner, &format!("/organization/questions/{}", quiz.free_text)).await?;
    assert_eq!(res.status, StatusCode::OK);
    let res = ctx.get(&owner, &format!("/organization/quizzes/{}", quiz.id)).await?;
    assert_eq!(res.data()["questions"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn quizzes_link_only_to_own_courses() -> Result<()> {
    let ctx = common::context();
    let (_, a) = common::tenant(&ctx, "Org A").await;
    let (_, b) = common::tenant(&ctx, "Org B").await;

    let foreign = ctx.post(&b, "/organization/courses", json!({ "title": "B course" })).await?;
    let res = ctx
        .post(&a, "/organization/quizzes", json!({ "title": "Quiz", "course": foreign.id() }))
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["errors"]["course"].is_array());

    let res = ctx.post(&a, "/organization/quizzes", json!({ "title": "Quiz", "pass_mark": 101 })).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["errors"]["pass_mark"].is_array());
    Ok(())
}

#[tokio::test]
async fn questions_are_locked_once_attempts_are_submitted() -> Result<()> {
    let ctx = common::context();
    let (acme, owner) = common::tenant(&ctx, "Acme").await;
    let student = common::member(&ctx, &acme, "Stu Dent", Role::Student).await;
    let quiz = quiz_with_questions(&ctx, &owner).await?;

    // An open attempt does not block editing
    let attempt = ctx.post(&student, &format!("/organization/quizzes/{}/attempts", quiz.id), json!({})).await?;
    let attempt_uri = format!("/organization/attempts/{}", attempt.id());
    let res = ctx.delete(&owner, &format!("/organization/questions/{}", quiz.true_false)).await?;
    assert_eq!(res.status, StatusCode::OK);

    ctx.put(
        &student,
        &format!("{}/answers", attempt_uri),
        json!({ "answers": [
            { "question": quiz.multiple_choice, "option": quiz.mc_correct },
            { "question": quiz.free_text, "text": "You count on" }
        ]}),
    )
    .await?;
    let res = ctx.post(&student, &format!("{}/submit", attempt_uri), json!({})).await?;
    assert_eq!(res.data()["status"], "submitted");
    assert_eq!(res.data()["score"], 2);

    for question in [quiz.free_text, quiz.multiple_choice] {
        let res = ctx.delete(&owner, &format!("/organization/questions/{}", question)).await?;
        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.body["data"]["count"], 1);
    }

    let res = ctx.get(&owner, &attempt_uri).await?;
    assert_eq!(res.data()["status"], "submitted");
    assert_eq!(res.data()["score"], 2);
    assert_eq!(res.data()["answers"].as_array().map(Vec::len), Some(2));
    Ok(())
}
