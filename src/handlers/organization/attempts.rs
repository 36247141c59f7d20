use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::database::models::{AnswerInput, ManualGrade, QuestionKind, QuizAnswer, QuizAttempt};
use crate::database::repository::QuizRepository;
use crate::error::ApiError;
use crate::guard::{Capability, OrgContext};
use crate::middleware::{ApiPath, ApiResponse, ApiResult, ValidatedJson};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/attempts/:id", get(show))
        .route("/attempts/:id/answers", put(save_answers))
        .route("/attempts/:id/submit", post(submit))
        .route("/attempts/:id/answers/:answer_id/grade", post(grade))
}

#[derive(Debug, Serialize)]
pub struct AttemptDetail {
    #[serde(flatten)]
    pub attempt: QuizAttempt,
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct AnswersRequest {
    #[validate(length(min = 1, message = "At least one answer is required."))]
    pub answers: Vec<AnswerRequest>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AnswerRequest {
    pub question: Uuid,
    pub option: Option<Uuid>,
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct GradeRequest {
    pub is_correct: Option<bool>,
    #[validate(range(min = 0, message = "The points may not be negative."))]
    pub points: Option<i32>,
    #[validate(length(max = 2000, message = "The feedback may not be greater than 2000 characters."))]
    pub feedback: Option<String>,
}

/// Only the actor who started the attempt may answer or submit it
fn ensure_owner(ctx: &OrgContext, attempt: &QuizAttempt) -> Result<(), ApiError> {
    if attempt.user_id == ctx.actor().user_id {
        return Ok(());
    }
    tracing::warn!("Actor {} tried to act on attempt {} of another user", ctx.actor().uuid, attempt.uuid);
    Err(ApiError::forbidden("Only the owner of this attempt may change it"))
}

/// Owner or a grader
pub async fn show(State(state): State<AppState>, ctx: OrgContext, ApiPath(id): ApiPath<Uuid>) -> ApiResult<AttemptDetail> {
    let attempt = ctx.scoped(state.store.find_attempt(id).await?)?;
    if attempt.user_id != ctx.actor().user_id {
        ctx.require(Capability::GradeQuizzes)?;
    }

    let answers = state.store.list_answers(attempt.id).await?;
    Ok(ApiResponse::success(AttemptDetail { attempt, answers }))
}

/// Upsert answers while the attempt is in progress. Each question must belong to the
/// attempt's quiz and each selected option to its question.
pub async fn save_answers(
    State(state): State<AppState>,
    ctx: OrgContext,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(body): ValidatedJson<AnswersRequest>,
) -> ApiResult<Vec<QuizAnswer>> {
    let attempt = ctx.authorize(Capability::TakeQuizzes, state.store.find_attempt(id).await?)?;
    ensure_owner(&ctx, &attempt)?;

    let questions = state.store.list_questions(attempt.quiz_id).await?;
    let mut inputs = Vec::with_capacity(body.answers.len());

    for answer in body.answers {
        let question = questions
            .iter()
            .find(|q| q.uuid == answer.question)
            .ok_or_else(|| ApiError::field("answers", format!("Question {} is not part of this quiz.", answer.question)))?;

        let selected_option_id = match answer.option {
            Some(option) if question.kind == QuestionKind::FreeText => {
                return Err(ApiError::field(
                    "answers",
                    format!("Question {} takes a text answer, not option {}.", question.uuid, option),
                ));
            }
            Some(option) => Some(
                question
                    .options
                    .iter()
                    .find(|o| o.uuid == option)
                    .map(|o| o.id)
                    .ok_or_else(|| {
                        ApiError::field("answers", format!("Option {} does not belong to question {}.", option, question.uuid))
                    })?,
            ),
            None => None,
        };

        inputs.push(AnswerInput {
            question_id: question.id,
            selected_option_id,
            answer_text: answer.text,
        });
    }

    let answers = state.store.save_answers(attempt.id, &inputs).await?;
    Ok(ApiResponse::success(answers).with_message("Answers saved"))
}

/// Objective answers are graded on submit; free text waits for a grader
pub async fn submit(State(state): State<AppState>, ctx: OrgContext, ApiPath(id): ApiPath<Uuid>) -> ApiResult<AttemptDetail> {
    let attempt = ctx.authorize(Capability::TakeQuizzes, state.store.find_attempt(id).await?)?;
    ensure_owner(&ctx, &attempt)?;

    let (attempt, answers) = state.store.submit_attempt(attempt.id).await?;
    tracing::info!(
        "Attempt {} submitted with status {:?} and score {:?}",
        attempt.uuid,
        attempt.status,
        attempt.score
    );
    Ok(ApiResponse::success(AttemptDetail { attempt, answers }).with_message("Attempt submitted"))
}

#[derive(Debug, Serialize)]
pub struct GradeResult {
    pub attempt: QuizAttempt,
    pub answer: QuizAnswer,
}

/// Grade one answer; the attempt's status and score are re-derived in the same transaction
pub async fn grade(
    State(state): State<AppState>,
    ctx: OrgContext,
    ApiPath((id, answer_id)): ApiPath<(Uuid, Uuid)>,
    ValidatedJson(body): ValidatedJson<GradeRequest>,
) -> ApiResult<GradeResult> {
    let attempt = ctx.authorize(Capability::GradeQuizzes, state.store.find_attempt(id).await?)?;

    let grade = ManualGrade {
        is_correct: body
            .is_correct
            .ok_or_else(|| ApiError::field("is_correct", "The is_correct field is required."))?,
        points: body
            .points
            .ok_or_else(|| ApiError::field("points", "The points field is required."))?,
        feedback: body.feedback,
    };

    let (attempt, answer) = state.store.grade_answer(attempt.id, answer_id, &grade).await?;
    tracing::debug!(
        "Actor {} graded answer {} on attempt {}; status now {:?}",
        ctx.actor().uuid,
        answer.uuid,
        attempt.uuid,
        attempt.status
    );
    Ok(ApiResponse::success(GradeResult { attempt, answer }).with_message("Answer graded"))
}
