use axum::{
    extract::State,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::not_blank;
use crate::app::AppState;
use crate::database::models::{NewOption, NewQuestion, NewQuiz, Question, QuestionKind, Quiz, QuizAttempt};
use crate::database::repository::{CourseRepository, QuizRepository};
use crate::error::ApiError;
use crate::guard::{Capability, OrgContext};
use crate::middleware::{ApiPath, ApiResponse, ApiResult, ValidatedJson};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/quizzes", get(list).post(create))
        .route("/quizzes/:id", get(show).delete(destroy))
        .route("/quizzes/:id/questions", post(add_question))
        .route("/quizzes/:id/attempts", post(start_attempt))
        .route("/questions/:id", delete(remove_question))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct QuizRequest {
    #[validate(
        custom(function = "not_blank"),
        length(max = 200, message = "The title may not be greater than 200 characters.")
    )]
    pub title: String,
    pub course: Option<Uuid>,
    #[validate(range(min = 0, max = 100, message = "The pass mark must be between 0 and 100."))]
    pub pass_mark: Option<i32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct QuestionRequest {
    pub kind: Option<QuestionKind>,
    #[validate(
        custom(function = "not_blank"),
        length(max = 2000, message = "The prompt may not be greater than 2000 characters.")
    )]
    pub prompt: String,
    #[validate(range(min = 1, max = 100, message = "The points must be between 1 and 100."))]
    pub points: i32,
    pub options: Vec<OptionRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OptionRequest {
    pub label: String,
    pub is_correct: bool,
}

/// Option as shown to the caller; correctness only for those who manage or grade quizzes
#[derive(Debug, Serialize)]
pub struct OptionView {
    pub id: Uuid,
    pub label: String,
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub kind: QuestionKind,
    pub prompt: String,
    pub points: i32,
    pub position: i32,
    pub options: Vec<OptionView>,
}

impl QuestionView {
    fn new(question: Question, reveal: bool) -> Self {
        Self {
            id: question.uuid,
            kind: question.kind,
            prompt: question.prompt,
            points: question.points,
            position: question.position,
            options: question
                .options
                .into_iter()
                .map(|o| OptionView {
                    id: o.uuid,
                    label: o.label,
                    position: o.position,
                    is_correct: reveal.then_some(o.is_correct),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionView>,
}

/// Option rules per question kind
fn check_options(kind: QuestionKind, options: &[OptionRequest]) -> Result<(), ApiError> {
    if options.iter().any(|o| o.label.trim().is_empty()) {
        return Err(ApiError::field("options", "Every option needs a label."));
    }
    let correct = options.iter().filter(|o| o.is_correct).count();

    match kind {
        QuestionKind::MultipleChoice if options.len() < 2 => {
            Err(ApiError::field("options", "A multiple choice question needs at least 2 options."))
        }
        QuestionKind::TrueFalse if options.len() != 2 => {
            Err(ApiError::field("options", "A true/false question needs exactly 2 options."))
        }
        QuestionKind::MultipleChoice | QuestionKind::TrueFalse if correct != 1 => {
            Err(ApiError::field("options", "Exactly one option must be marked correct."))
        }
        QuestionKind::FreeText if !options.is_empty() => {
            Err(ApiError::field("options", "A free text question does not take options."))
        }
        _ => Ok(()),
    }
}

pub async fn list(State(state): State<AppState>, ctx: OrgContext) -> ApiResult<Vec<Quiz>> {
    ctx.require(Capability::ViewContent)?;
    let quizzes = state.store.list_quizzes(ctx.organization_id()).await?;
    Ok(ApiResponse::success(quizzes))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: OrgContext,
    ValidatedJson(body): ValidatedJson<QuizRequest>,
) -> ApiResult<Quiz> {
    ctx.require(Capability::ManageQuizzes)?;

    let course_id = match body.course {
        Some(uuid) => {
            let course = state
                .store
                .find_course(uuid)
                .await?
                .filter(|c| c.organization_id == ctx.organization_id())
                .ok_or_else(|| ApiError::field("course", "The selected course is invalid."))?;
            Some(course.id)
        }
        None => None,
    };

    let quiz = state
        .store
        .create_quiz(&NewQuiz {
            organization_id: ctx.organization_id(),
            course_id,
            title: body.title.trim().to_string(),
            pass_mark: body.pass_mark,
        })
        .await?;
    tracing::info!("Quiz {} created in organization {}", quiz.uuid, ctx.organization_id());
    Ok(ApiResponse::created(quiz).with_message("Quiz created"))
}

pub async fn show(State(state): State<AppState>, ctx: OrgContext, ApiPath(id): ApiPath<Uuid>) -> ApiResult<QuizDetail> {
    ctx.require(Capability::ViewContent)?;
    let quiz = ctx.scoped(state.store.find_quiz(id).await?)?;
    let reveal = ctx.can(Capability::ManageQuizzes) || ctx.can(Capability::GradeQuizzes);

    let questions = state
        .store
        .list_questions(quiz.id)
        .await?
        .into_iter()
        .map(|q| QuestionView::new(q, reveal))
        .collect();
    Ok(ApiResponse::success(QuizDetail { quiz, questions }))
}

/// Questions, options, attempts and answers go with the quiz
pub async fn destroy(State(state): State<AppState>, ctx: OrgContext, ApiPath(id): ApiPath<Uuid>) -> ApiResult<()> {
    let quiz = ctx.authorize(Capability::ManageQuizzes, state.store.find_quiz(id).await?)?;
    state.store.delete_quiz(quiz.id).await?;
    Ok(ApiResponse::message("Quiz deleted"))
}

/// Question and its options are written in one transaction
pub async fn add_question(
    State(state): State<AppState>,
    ctx: OrgContext,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(body): ValidatedJson<QuestionRequest>,
) -> ApiResult<QuestionView> {
    let quiz = ctx.authorize(Capability::ManageQuizzes, state.store.find_quiz(id).await?)?;

    let kind = body
        .kind
        .ok_or_else(|| ApiError::field("kind", "The kind field is required."))?;
    check_options(kind, &body.options)?;

    let input = NewQuestion {
        kind,
        prompt: body.prompt.trim().to_string(),
        points: body.points,
        options: body
            .options
            .into_iter()
            .map(|o| NewOption {
                label: o.label.trim().to_string(),
                is_correct: o.is_correct,
            })
            .collect(),
    };

    let question = state.store.create_question(quiz.id, &input).await?;
    tracing::debug!("Question {} added to quiz {}", question.uuid, quiz.uuid);
    Ok(ApiResponse::created(QuestionView::new(question, true)).with_message("Question created"))
}

pub async fn remove_question(State(state): State<AppState>, ctx: OrgContext, ApiPath(id): ApiPath<Uuid>) -> ApiResult<()> {
    let question = ctx.authorize(Capability::ManageQuizzes, state.store.find_question(id).await?)?;

    // Removing answers from a submitted attempt would leave its status and score stale
    let count = state.store.count_finished_attempts(question.quiz_id).await?;
    if count > 0 {
        return Err(ApiError::conflict_with_count(
            "Quiz already has submitted attempts and its questions cannot be deleted",
            count,
        ));
    }

    state.store.delete_question(question.id).await?;
    Ok(ApiResponse::message("Question deleted"))
}

pub async fn start_attempt(
    State(state): State<AppState>,
    ctx: OrgContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<QuizAttempt> {
    let quiz = ctx.authorize(Capability::TakeQuizzes, state.store.find_quiz(id).await?)?;

    let attempt = state
        .store
        .start_attempt(quiz.id, ctx.organization_id(), ctx.actor().user_id)
        .await?;
    tracing::debug!("Actor {} started attempt {} on quiz {}", ctx.actor().uuid, attempt.uuid, quiz.uuid);
    Ok(ApiResponse::created(attempt).with_message("Attempt started"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(flags: &[bool]) -> Vec<OptionRequest> {
        flags.iter()
            .enumerate()
            .map(|(i, &is_correct)| OptionRequest { label: format!("Option {}", i), is_correct })
            .collect()
    }

    #[test]
    fn multiple_choice_needs_one_correct_of_several() {
        assert!(check_options(QuestionKind::MultipleChoice, &options(&[true, false, false])).is_ok());
        assert!(check_options(QuestionKind::MultipleChoice, &options(&[true])).is_err());
        assert!(check_options(QuestionKind::MultipleChoice, &options(&[true, true])).is_err());
        assert!(check_options(QuestionKind::MultipleChoice, &options(&[false, false])).is_err());
    }

    #[test]
    fn true_false_takes_exactly_two() {
        assert!(check_options(QuestionKind::TrueFalse, &options(&[false, true])).is_ok());
        assert!(check_options(QuestionKind::TrueFalse, &options(&[false, true, false])).is_err());
    }

    #[test]
    fn free_text_takes_none() {
        assert!(check_options(QuestionKind::FreeText, &[]).is_ok());
        let err = check_options(QuestionKind::FreeText, &options(&[true])).unwrap_err();
        assert_eq!(err.status_code(), 422);
    }
}
