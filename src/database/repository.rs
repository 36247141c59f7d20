//! Persistence seams. Each resource family has its own trait; `Store` bundles them
//! so application state can hold one `Arc<dyn Store>` for either backend.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::*;
use crate::services::grading::GradingError;

/// Failure of a locked attempt mutation: either the state machine refused it or the store failed
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Grading(#[from] GradingError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for AttemptError {
    fn from(err: sqlx::Error) -> Self {
        AttemptError::Database(err.into())
    }
}

#[async_trait]
pub trait ActorRepository: Send + Sync {
    async fn find_user(&self, uuid: Uuid) -> Result<Option<UserRecord>, DatabaseError>;

    /// Organization whose `owner_user_id` is this user
    async fn owned_organization(&self, user_id: i64) -> Result<Option<i64>, DatabaseError>;

    async fn instructor_organization(&self, user_id: i64) -> Result<Option<i64>, DatabaseError>;

    async fn granted_capabilities(&self, user_id: i64) -> Result<Vec<String>, DatabaseError>;

    async fn find_organization(&self, id: i64) -> Result<Option<Organization>, DatabaseError>;

    async fn admin_users(&self) -> Result<Vec<UserRecord>, DatabaseError>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Global categories followed by the organization's own
    async fn list_categories(&self, organization_id: i64) -> Result<Vec<Category>, DatabaseError>;

    async fn find_category(&self, uuid: Uuid) -> Result<Option<Category>, DatabaseError>;

    /// Case-insensitive name check within one organization
    async fn category_name_taken(&self, organization_id: i64, name: &str, exclude: Option<i64>) -> Result<bool, DatabaseError>;

    async fn create_category(&self, organization_id: i64, name: &str) -> Result<Category, DatabaseError>;

    async fn rename_category(&self, id: i64, name: &str) -> Result<Category, DatabaseError>;

    async fn count_category_courses(&self, id: i64) -> Result<i64, DatabaseError>;

    async fn delete_category(&self, id: i64) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn list_courses(&self, organization_id: i64, kind: CourseKind, limit: i64, offset: i64) -> Result<(Vec<Course>, i64), DatabaseError>;

    async fn find_course(&self, uuid: Uuid) -> Result<Option<Course>, DatabaseError>;

    async fn create_course(&self, organization_id: i64, kind: CourseKind, input: &CourseInput) -> Result<Course, DatabaseError>;

    async fn update_course(&self, id: i64, input: &CourseInput) -> Result<Course, DatabaseError>;

    /// Removes the course and its whole outline
    async fn delete_course(&self, id: i64) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait OutlineRepository: Send + Sync {
    /// Children of `parent_id`, ordered by position
    async fn list_nodes(&self, level: OutlineLevel, parent_id: i64) -> Result<Vec<OutlineNode>, DatabaseError>;

    async fn find_node(&self, level: OutlineLevel, uuid: Uuid) -> Result<Option<OutlineNode>, DatabaseError>;

    /// Appends after the last sibling
    async fn create_node(&self, level: OutlineLevel, parent_id: i64, input: &NewOutlineNode) -> Result<OutlineNode, DatabaseError>;

    async fn update_node(&self, level: OutlineLevel, id: i64, input: &NewOutlineNode) -> Result<OutlineNode, DatabaseError>;

    async fn delete_node(&self, level: OutlineLevel, id: i64) -> Result<(), DatabaseError>;

    /// Writes every `(id, position)` pair in one transaction
    async fn apply_positions(&self, level: OutlineLevel, parent_id: i64, positions: &[(i64, i32)]) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn list_documents(&self, organization_id: i64, limit: i64, offset: i64) -> Result<(Vec<Document>, i64), DatabaseError>;

    async fn find_document(&self, uuid: Uuid) -> Result<Option<Document>, DatabaseError>;

    async fn create_document(&self, input: &NewDocument) -> Result<Document, DatabaseError>;

    /// Chapters pointing at this document
    async fn count_document_references(&self, id: i64) -> Result<i64, DatabaseError>;

    async fn delete_document(&self, id: i64) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn list_quizzes(&self, organization_id: i64) -> Result<Vec<Quiz>, DatabaseError>;

    async fn find_quiz(&self, uuid: Uuid) -> Result<Option<Quiz>, DatabaseError>;

    async fn create_quiz(&self, input: &NewQuiz) -> Result<Quiz, DatabaseError>;

    async fn delete_quiz(&self, id: i64) -> Result<(), DatabaseError>;

    /// Questions with their options, ordered by position
    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<Question>, DatabaseError>;

    async fn find_question(&self, uuid: Uuid) -> Result<Option<Question>, DatabaseError>;

    /// Question and options are written together or not at all
    async fn create_question(&self, quiz_id: i64, input: &NewQuestion) -> Result<Question, DatabaseError>;

    async fn delete_question(&self, id: i64) -> Result<(), DatabaseError>;

    /// Attempts on the quiz that are submitted or graded
    async fn count_finished_attempts(&self, quiz_id: i64) -> Result<i64, DatabaseError>;

    async fn start_attempt(&self, quiz_id: i64, organization_id: i64, user_id: i64) -> Result<QuizAttempt, DatabaseError>;

    async fn find_attempt(&self, uuid: Uuid) -> Result<Option<QuizAttempt>, DatabaseError>;

    async fn list_answers(&self, attempt_id: i64) -> Result<Vec<QuizAnswer>, DatabaseError>;

    /// Upsert one answer per question while the attempt is in progress
    async fn save_answers(&self, attempt_id: i64, answers: &[AnswerInput]) -> Result<Vec<QuizAnswer>, AttemptError>;

    /// Lock, auto-grade, derive status and score
    async fn submit_attempt(&self, attempt_id: i64) -> Result<(QuizAttempt, Vec<QuizAnswer>), AttemptError>;

    /// Lock, grade one answer, re-derive status and score
    async fn grade_answer(&self, attempt_id: i64, answer_uuid: Uuid, grade: &ManualGrade) -> Result<(QuizAttempt, QuizAnswer), AttemptError>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// `author` restricts the listing to one user's tickets
    async fn list_tickets(&self, organization_id: i64, author: Option<i64>, limit: i64, offset: i64) -> Result<(Vec<Ticket>, i64), DatabaseError>;

    async fn find_ticket(&self, uuid: Uuid) -> Result<Option<Ticket>, DatabaseError>;

    /// Ticket and first message in one transaction
    async fn create_ticket(&self, input: &NewTicket) -> Result<(Ticket, TicketReply), DatabaseError>;

    async fn list_replies(&self, ticket_id: i64) -> Result<Vec<TicketReply>, DatabaseError>;

    /// `None` when the ticket is closed
    async fn add_reply(&self, ticket_id: i64, author_user_id: i64, body: &str, status: Option<TicketStatus>) -> Result<Option<TicketReply>, DatabaseError>;

    async fn set_ticket_status(&self, id: i64, status: TicketStatus) -> Result<Ticket, DatabaseError>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn list_subscriptions(&self, organization_id: i64) -> Result<Vec<Subscription>, DatabaseError>;

    async fn find_subscription(&self, uuid: Uuid) -> Result<Option<Subscription>, DatabaseError>;

    async fn active_subscription(&self, organization_id: i64) -> Result<Option<Subscription>, DatabaseError>;

    async fn create_subscription(&self, organization_id: i64, plan: &str, external_id: &str, checkout_url: &str) -> Result<Subscription, DatabaseError>;

    async fn cancel_subscription(&self, id: i64) -> Result<Subscription, DatabaseError>;
}

#[async_trait]
pub trait Store:
    ActorRepository
    + CategoryRepository
    + CourseRepository
    + OutlineRepository
    + DocumentRepository
    + QuizRepository
    + TicketRepository
    + SubscriptionRepository
{
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}
