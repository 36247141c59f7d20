use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::guard::TenantOwned;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Quiz {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub organization_id: i64,
    #[serde(skip_serializing)]
    pub course_id: Option<i64>,
    #[serde(rename = "course")]
    pub course_uuid: Option<Uuid>,
    pub title: String,
    pub pass_mark: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl TenantOwned for Quiz {
    const KIND: &'static str = "Quiz";

    fn organization_id(&self) -> Option<i64> {
        Some(self.organization_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub organization_id: i64,
    pub course_id: Option<i64>,
    pub title: String,
    pub pass_mark: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "question_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    FreeText,
}

impl QuestionKind {
    /// Objective questions are graded automatically on submit
    pub fn is_auto_graded(self) -> bool {
        !matches!(self, QuestionKind::FreeText)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Question {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub quiz_id: i64,
    #[serde(skip_serializing)]
    pub organization_id: i64,
    pub kind: QuestionKind,
    pub prompt: String,
    pub points: i32,
    pub position: i32,
    #[sqlx(skip)]
    pub options: Vec<QuestionOption>,
}

impl TenantOwned for Question {
    const KIND: &'static str = "Question";

    fn organization_id(&self) -> Option<i64> {
        Some(self.organization_id)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuestionOption {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub question_id: i64,
    pub label: String,
    pub is_correct: bool,
    pub position: i32,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub kind: QuestionKind,
    pub prompt: String,
    pub points: i32,
    pub options: Vec<NewOption>,
}

#[derive(Debug, Clone)]
pub struct NewOption {
    pub label: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attempt_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Graded,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuizAttempt {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub quiz_id: i64,
    #[serde(rename = "quiz")]
    pub quiz_uuid: Uuid,
    #[serde(skip_serializing)]
    pub organization_id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    #[serde(rename = "user")]
    pub user_uuid: Uuid,
    pub status: AttemptStatus,
    pub score: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
}

impl TenantOwned for QuizAttempt {
    const KIND: &'static str = "Attempt";

    fn organization_id(&self) -> Option<i64> {
        Some(self.organization_id)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuizAnswer {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(skip_serializing)]
    pub attempt_id: i64,
    #[serde(skip_serializing)]
    pub question_id: i64,
    #[serde(rename = "question")]
    pub question_uuid: Uuid,
    #[serde(skip_serializing)]
    pub selected_option_id: Option<i64>,
    #[serde(rename = "selected_option")]
    pub selected_option_uuid: Option<Uuid>,
    pub answer_text: Option<String>,
    pub is_correct: Option<bool>,
    pub points_awarded: Option<i32>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnswerInput {
    pub question_id: i64,
    pub selected_option_id: Option<i64>,
    pub answer_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ManualGrade {
    pub is_correct: bool,
    pub points: i32,
    pub feedback: Option<String>,
}
