//! In-process store with the same semantics as the PostgreSQL backend.
//! Used for `DATABASE_BACKEND=memory` and by the test suite.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::category::normalize_name;
use super::models::*;
use super::repository::*;
use crate::guard::Role;
use crate::services::grading;

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    organizations: Vec<Organization>,
    users: Vec<UserRecord>,
    instructors: Vec<(i64, i64)>,
    grants: Vec<(i64, String)>,
    categories: Vec<Category>,
    courses: Vec<Course>,
    nodes: HashMap<OutlineLevel, Vec<OutlineNode>>,
    documents: Vec<Document>,
    quizzes: Vec<Quiz>,
    questions: Vec<Question>,
    attempts: Vec<QuizAttempt>,
    answers: Vec<QuizAnswer>,
    tickets: Vec<Ticket>,
    replies: Vec<TicketReply>,
    subscriptions: Vec<Subscription>,
}

fn missing(what: &str, id: i64) -> DatabaseError {
    DatabaseError::NotFound(format!("{} {}", what, id))
}

fn page<T: Clone>(rows: Vec<&T>, limit: i64, offset: i64) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let items = rows
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect();
    (items, total)
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_uuid(&self, id: i64) -> Result<Uuid, DatabaseError> {
        self.users.iter().find(|u| u.id == id).map(|u| u.uuid).ok_or_else(|| missing("user", id))
    }

    fn category_uuid(&self, id: Option<i64>) -> Option<Uuid> {
        id.and_then(|id| self.categories.iter().find(|c| c.id == id)).map(|c| c.uuid)
    }

    fn course_uuid(&self, id: Option<i64>) -> Option<Uuid> {
        id.and_then(|id| self.courses.iter().find(|c| c.id == id)).map(|c| c.uuid)
    }

    fn document_uuid(&self, id: Option<i64>) -> Option<Uuid> {
        id.and_then(|id| self.documents.iter().find(|d| d.id == id)).map(|d| d.uuid)
    }

    fn family(&mut self, level: OutlineLevel) -> &mut Vec<OutlineNode> {
        self.nodes.entry(level).or_default()
    }

    /// Organization and course kind of a node's parent
    fn parent_scope(&self, level: OutlineLevel, parent_id: i64) -> Result<(i64, CourseKind), DatabaseError> {
        match level.parent_level() {
            None => self
                .courses
                .iter()
                .find(|c| c.id == parent_id)
                .map(|c| (c.organization_id, c.kind))
                .ok_or_else(|| missing("course", parent_id)),
            Some(parent_level) => self
                .nodes
                .get(&parent_level)
                .and_then(|nodes| nodes.iter().find(|n| n.id == parent_id))
                .map(|n| (n.organization_id, n.course_kind))
                .ok_or_else(|| missing(parent_level.label(), parent_id)),
        }
    }

    /// Remove a node family's rows for the given parents, cascading downward
    fn remove_nodes(&mut self, level: OutlineLevel, parent_ids: &[i64]) {
        let removed: Vec<i64> = self
            .family(level)
            .iter()
            .filter(|n| parent_ids.contains(&n.parent_id))
            .map(|n| n.id)
            .collect();
        self.family(level).retain(|n| !parent_ids.contains(&n.parent_id));
        let child = match level {
            OutlineLevel::Section => Some(OutlineLevel::Chapter),
            OutlineLevel::Chapter => Some(OutlineLevel::SubChapter),
            _ => None,
        };
        if let (Some(child), false) = (child, removed.is_empty()) {
            self.remove_nodes(child, &removed);
        }
    }

    fn remove_quiz_children(&mut self, question_ids: &[i64], attempt_ids: &[i64]) {
        self.questions.retain(|q| !question_ids.contains(&q.id));
        self.answers
            .retain(|a| !question_ids.contains(&a.question_id) && !attempt_ids.contains(&a.attempt_id));
        self.attempts.retain(|a| !attempt_ids.contains(&a.id));
    }

    fn attempt_mut(&mut self, attempt_id: i64) -> Result<&mut QuizAttempt, DatabaseError> {
        self.attempts
            .iter_mut()
            .find(|a| a.id == attempt_id)
            .ok_or_else(|| missing("attempt", attempt_id))
    }

    fn attempt_answers(&self, attempt_id: i64) -> Vec<QuizAnswer> {
        self.answers.iter().filter(|a| a.attempt_id == attempt_id).cloned().collect()
    }

    fn store_answers(&mut self, graded: &[QuizAnswer]) {
        for answer in graded {
            if let Some(slot) = self.answers.iter_mut().find(|a| a.id == answer.id) {
                *slot = answer.clone();
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_organization(&self, name: &str) -> Organization {
        let mut state = self.state.write().await;
        let organization = Organization {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            owner_user_id: None,
            created_at: Utc::now(),
        };
        state.organizations.push(organization.clone());
        organization
    }

    /// `staff_organization_id` is the user's own belongs-to link
    pub async fn seed_user(&self, name: &str, role: Role, staff_organization_id: Option<i64>) -> UserRecord {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let user = UserRecord {
            id,
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}.{}@example.test", name.to_lowercase().replace(' ', "."), id),
            role,
            organization_id: staff_organization_id,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        user
    }

    pub async fn set_owner(&self, organization_id: i64, user_id: i64) {
        let mut state = self.state.write().await;
        if let Some(org) = state.organizations.iter_mut().find(|o| o.id == organization_id) {
            org.owner_user_id = Some(user_id);
        }
    }

    pub async fn link_instructor(&self, user_id: i64, organization_id: i64) {
        self.state.write().await.instructors.push((user_id, organization_id));
    }

    pub async fn grant(&self, user_id: i64, capability: &str) {
        self.state.write().await.grants.push((user_id, capability.to_string()));
    }

    pub async fn seed_global_category(&self, name: &str) -> Category {
        let mut state = self.state.write().await;
        let category = Category {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            organization_id: None,
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };
        state.categories.push(category.clone());
        category
    }

    pub async fn seed_subscription(&self, organization_id: i64, plan: &str, status: SubscriptionStatus) -> Subscription {
        let mut state = self.state.write().await;
        let subscription = Subscription {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            organization_id,
            plan: plan.to_string(),
            status,
            external_id: Some(format!("sub_{}", Uuid::new_v4().simple())),
            checkout_url: None,
            created_at: Utc::now(),
            canceled_at: None,
        };
        state.subscriptions.push(subscription.clone());
        subscription
    }
}

#[async_trait]
impl ActorRepository for MemoryStore {
    async fn find_user(&self, uuid: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        Ok(self.state.read().await.users.iter().find(|u| u.uuid == uuid).cloned())
    }

    async fn owned_organization(&self, user_id: i64) -> Result<Option<i64>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .organizations
            .iter()
            .filter(|o| o.owner_user_id == Some(user_id))
            .map(|o| o.id)
            .min())
    }

    async fn instructor_organization(&self, user_id: i64) -> Result<Option<i64>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.instructors.iter().find(|(user, _)| *user == user_id).map(|(_, org)| *org))
    }

    async fn granted_capabilities(&self, user_id: i64) -> Result<Vec<String>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .grants
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn find_organization(&self, id: i64) -> Result<Option<Organization>, DatabaseError> {
        Ok(self.state.read().await.organizations.iter().find(|o| o.id == id).cloned())
    }

    async fn admin_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.users.iter().filter(|u| u.role == Role::Admin).cloned().collect())
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn list_categories(&self, organization_id: i64) -> Result<Vec<Category>, DatabaseError> {
        let state = self.state.read().await;
        let mut categories: Vec<Category> = state
            .categories
            .iter()
            .filter(|c| c.is_visible_to(organization_id))
            .cloned()
            .collect();
        categories.sort_by(|a, b| {
            (a.organization_id.is_some(), normalize_name(&a.name)).cmp(&(b.organization_id.is_some(), normalize_name(&b.name)))
        });
        Ok(categories)
    }

    async fn find_category(&self, uuid: Uuid) -> Result<Option<Category>, DatabaseError> {
        Ok(self.state.read().await.categories.iter().find(|c| c.uuid == uuid).cloned())
    }

    async fn category_name_taken(&self, organization_id: i64, name: &str, exclude: Option<i64>) -> Result<bool, DatabaseError> {
        let wanted = normalize_name(name);
        let state = self.state.read().await;
        Ok(state.categories.iter().any(|c| {
            c.organization_id == Some(organization_id) && Some(c.id) != exclude && normalize_name(&c.name) == wanted
        }))
    }

    async fn create_category(&self, organization_id: i64, name: &str) -> Result<Category, DatabaseError> {
        let mut state = self.state.write().await;
        let wanted = normalize_name(name);
        if state
            .categories
            .iter()
            .any(|c| c.organization_id == Some(organization_id) && normalize_name(&c.name) == wanted)
        {
            return Err(DatabaseError::UniqueViolation("categories_organization_name_key".into()));
        }
        let category = Category {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            organization_id: Some(organization_id),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn rename_category(&self, id: i64, name: &str) -> Result<Category, DatabaseError> {
        let mut state = self.state.write().await;
        let wanted = normalize_name(name);
        let owner = state.categories.iter().find(|c| c.id == id).and_then(|c| c.organization_id);
        if state
            .categories
            .iter()
            .any(|c| c.id != id && c.organization_id == owner && owner.is_some() && normalize_name(&c.name) == wanted)
        {
            return Err(DatabaseError::UniqueViolation("categories_organization_name_key".into()));
        }
        let category = state
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| missing("category", id))?;
        category.name = name.trim().to_string();
        Ok(category.clone())
    }

    async fn count_category_courses(&self, id: i64) -> Result<i64, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.courses.iter().filter(|c| c.category_id == Some(id)).count() as i64)
    }

    async fn delete_category(&self, id: i64) -> Result<(), DatabaseError> {
        self.state.write().await.categories.retain(|c| c.id != id);
        Ok(())
    }
}

#[async_trait]
impl CourseRepository for MemoryStore {
    async fn list_courses(&self, organization_id: i64, kind: CourseKind, limit: i64, offset: i64) -> Result<(Vec<Course>, i64), DatabaseError> {
        let state = self.state.read().await;
        let rows = state
            .courses
            .iter()
            .rev()
            .filter(|c| c.organization_id == organization_id && c.kind == kind)
            .collect();
        Ok(page(rows, limit, offset))
    }

    async fn find_course(&self, uuid: Uuid) -> Result<Option<Course>, DatabaseError> {
        Ok(self.state.read().await.courses.iter().find(|c| c.uuid == uuid).cloned())
    }

    async fn create_course(&self, organization_id: i64, kind: CourseKind, input: &CourseInput) -> Result<Course, DatabaseError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let course = Course {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            organization_id,
            kind,
            title: input.title.clone(),
            description: input.description.clone(),
            category_id: input.category_id,
            category_uuid: state.category_uuid(input.category_id),
            published: input.published,
            created_at: now,
            updated_at: now,
        };
        state.courses.push(course.clone());
        Ok(course)
    }

    async fn update_course(&self, id: i64, input: &CourseInput) -> Result<Course, DatabaseError> {
        let mut state = self.state.write().await;
        let category_uuid = state.category_uuid(input.category_id);
        let course = state.courses.iter_mut().find(|c| c.id == id).ok_or_else(|| missing("course", id))?;
        course.title = input.title.clone();
        course.description = input.description.clone();
        course.category_id = input.category_id;
        course.category_uuid = category_uuid;
        course.published = input.published;
        course.updated_at = Utc::now();
        Ok(course.clone())
    }

    async fn delete_course(&self, id: i64) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state.courses.retain(|c| c.id != id);
        state.remove_nodes(OutlineLevel::Section, &[id]);
        state.remove_nodes(OutlineLevel::Objective, &[id]);
        for quiz in state.quizzes.iter_mut().filter(|q| q.course_id == Some(id)) {
            quiz.course_id = None;
            quiz.course_uuid = None;
        }
        Ok(())
    }
}

#[async_trait]
impl OutlineRepository for MemoryStore {
    async fn list_nodes(&self, level: OutlineLevel, parent_id: i64) -> Result<Vec<OutlineNode>, DatabaseError> {
        let state = self.state.read().await;
        let mut nodes: Vec<OutlineNode> = state
            .nodes
            .get(&level)
            .map(|nodes| nodes.iter().filter(|n| n.parent_id == parent_id).cloned().collect())
            .unwrap_or_default();
        nodes.sort_by_key(|n| (n.position, n.id));
        Ok(nodes)
    }

    async fn find_node(&self, level: OutlineLevel, uuid: Uuid) -> Result<Option<OutlineNode>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.nodes.get(&level).and_then(|nodes| nodes.iter().find(|n| n.uuid == uuid)).cloned())
    }

    async fn create_node(&self, level: OutlineLevel, parent_id: i64, input: &NewOutlineNode) -> Result<OutlineNode, DatabaseError> {
        let mut state = self.state.write().await;
        let (organization_id, course_kind) = state.parent_scope(level, parent_id)?;
        let position = state
            .nodes
            .get(&level)
            .and_then(|nodes| nodes.iter().filter(|n| n.parent_id == parent_id).map(|n| n.position).max())
            .map_or(level.position_base(), |last| last + 1);
        let document_id = input.document_id.filter(|_| level.supports_documents());
        let node = OutlineNode {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            parent_id,
            organization_id,
            course_kind,
            title: input.title.clone(),
            body: input.body.clone(),
            document_id,
            document_uuid: state.document_uuid(document_id),
            position,
        };
        state.family(level).push(node.clone());
        Ok(node)
    }

    async fn update_node(&self, level: OutlineLevel, id: i64, input: &NewOutlineNode) -> Result<OutlineNode, DatabaseError> {
        let mut state = self.state.write().await;
        let document_id = input.document_id.filter(|_| level.supports_documents());
        let document_uuid = state.document_uuid(document_id);
        let node = state
            .family(level)
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| missing(level.label(), id))?;
        node.title = input.title.clone();
        node.body = input.body.clone();
        node.document_id = document_id;
        node.document_uuid = document_uuid;
        Ok(node.clone())
    }

    async fn delete_node(&self, level: OutlineLevel, id: i64) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state.family(level).retain(|n| n.id != id);
        match level {
            OutlineLevel::Section => state.remove_nodes(OutlineLevel::Chapter, &[id]),
            OutlineLevel::Chapter => state.remove_nodes(OutlineLevel::SubChapter, &[id]),
            _ => {}
        }
        Ok(())
    }

    async fn apply_positions(&self, level: OutlineLevel, parent_id: i64, positions: &[(i64, i32)]) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let family = state.family(level);
        // Validate first so a bad id leaves every row untouched
        if let Some((missing_id, _)) = positions
            .iter()
            .find(|(id, _)| !family.iter().any(|n| n.id == *id && n.parent_id == parent_id))
        {
            return Err(missing(level.label(), *missing_id));
        }
        for (id, position) in positions {
            if let Some(node) = family.iter_mut().find(|n| n.id == *id) {
                node.position = *position;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn list_documents(&self, organization_id: i64, limit: i64, offset: i64) -> Result<(Vec<Document>, i64), DatabaseError> {
        let state = self.state.read().await;
        let rows = state.documents.iter().rev().filter(|d| d.organization_id == organization_id).collect();
        Ok(page(rows, limit, offset))
    }

    async fn find_document(&self, uuid: Uuid) -> Result<Option<Document>, DatabaseError> {
        Ok(self.state.read().await.documents.iter().find(|d| d.uuid == uuid).cloned())
    }

    async fn create_document(&self, input: &NewDocument) -> Result<Document, DatabaseError> {
        let mut state = self.state.write().await;
        let document = Document {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            organization_id: input.organization_id,
            title: input.title.clone(),
            category: input.category,
            path: input.path.clone(),
            url: input.url.clone(),
            size_bytes: input.size_bytes,
            mime_type: input.mime_type.clone(),
            original_name: input.original_name.clone(),
            created_at: Utc::now(),
        };
        state.documents.push(document.clone());
        Ok(document)
    }

    async fn count_document_references(&self, id: i64) -> Result<i64, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .nodes
            .get(&OutlineLevel::Chapter)
            .map_or(0, |chapters| chapters.iter().filter(|c| c.document_id == Some(id)).count()) as i64)
    }

    async fn delete_document(&self, id: i64) -> Result<(), DatabaseError> {
        self.state.write().await.documents.retain(|d| d.id != id);
        Ok(())
    }
}

#[async_trait]
impl QuizRepository for MemoryStore {
    async fn list_quizzes(&self, organization_id: i64) -> Result<Vec<Quiz>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.quizzes.iter().rev().filter(|q| q.organization_id == organization_id).cloned().collect())
    }

    async fn find_quiz(&self, uuid: Uuid) -> Result<Option<Quiz>, DatabaseError> {
        Ok(self.state.read().await.quizzes.iter().find(|q| q.uuid == uuid).cloned())
    }

    async fn create_quiz(&self, input: &NewQuiz) -> Result<Quiz, DatabaseError> {
        let mut state = self.state.write().await;
        let quiz = Quiz {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            organization_id: input.organization_id,
            course_id: input.course_id,
            course_uuid: state.course_uuid(input.course_id),
            title: input.title.clone(),
            pass_mark: input.pass_mark,
            created_at: Utc::now(),
        };
        state.quizzes.push(quiz.clone());
        Ok(quiz)
    }

    async fn delete_quiz(&self, id: i64) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let questions: Vec<i64> = state.questions.iter().filter(|q| q.quiz_id == id).map(|q| q.id).collect();
        let attempts: Vec<i64> = state.attempts.iter().filter(|a| a.quiz_id == id).map(|a| a.id).collect();
        state.remove_quiz_children(&questions, &attempts);
        state.quizzes.retain(|q| q.id != id);
        Ok(())
    }

    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<Question>, DatabaseError> {
        let state = self.state.read().await;
        let mut questions: Vec<Question> = state.questions.iter().filter(|q| q.quiz_id == quiz_id).cloned().collect();
        questions.sort_by_key(|q| (q.position, q.id));
        Ok(questions)
    }

    async fn find_question(&self, uuid: Uuid) -> Result<Option<Question>, DatabaseError> {
        Ok(self.state.read().await.questions.iter().find(|q| q.uuid == uuid).cloned())
    }

    async fn create_question(&self, quiz_id: i64, input: &NewQuestion) -> Result<Question, DatabaseError> {
        let mut state = self.state.write().await;
        let organization_id = state
            .quizzes
            .iter()
            .find(|q| q.id == quiz_id)
            .map(|q| q.organization_id)
            .ok_or_else(|| missing("quiz", quiz_id))?;
        let position = state
            .questions
            .iter()
            .filter(|q| q.quiz_id == quiz_id)
            .map(|q| q.position)
            .max()
            .map_or(1, |last| last + 1);
        let id = state.next_id();
        let mut options = Vec::with_capacity(input.options.len());
        for (index, option) in input.options.iter().enumerate() {
            options.push(QuestionOption {
                id: state.next_id(),
                uuid: Uuid::new_v4(),
                question_id: id,
                label: option.label.clone(),
                is_correct: option.is_correct,
                position: index as i32 + 1,
            });
        }
        let question = Question {
            id,
            uuid: Uuid::new_v4(),
            quiz_id,
            organization_id,
            kind: input.kind,
            prompt: input.prompt.clone(),
            points: input.points,
            position,
            options,
        };
        state.questions.push(question.clone());
        Ok(question)
    }

    async fn delete_question(&self, id: i64) -> Result<(), DatabaseError> {
        self.state.write().await.remove_quiz_children(&[id], &[]);
        Ok(())
    }

    async fn count_finished_attempts(&self, quiz_id: i64) -> Result<i64, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .attempts
            .iter()
            .filter(|a| a.quiz_id == quiz_id && a.status != AttemptStatus::InProgress)
            .count() as i64)
    }

    async fn start_attempt(&self, quiz_id: i64, organization_id: i64, user_id: i64) -> Result<QuizAttempt, DatabaseError> {
        let mut state = self.state.write().await;
        let quiz_uuid = state
            .quizzes
            .iter()
            .find(|q| q.id == quiz_id)
            .map(|q| q.uuid)
            .ok_or_else(|| missing("quiz", quiz_id))?;
        let attempt = QuizAttempt {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            quiz_id,
            quiz_uuid,
            organization_id,
            user_id,
            user_uuid: state.user_uuid(user_id)?,
            status: AttemptStatus::InProgress,
            score: None,
            started_at: Utc::now(),
            submitted_at: None,
            graded_at: None,
        };
        state.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn find_attempt(&self, uuid: Uuid) -> Result<Option<QuizAttempt>, DatabaseError> {
        Ok(self.state.read().await.attempts.iter().find(|a| a.uuid == uuid).cloned())
    }

    async fn list_answers(&self, attempt_id: i64) -> Result<Vec<QuizAnswer>, DatabaseError> {
        Ok(self.state.read().await.attempt_answers(attempt_id))
    }

    async fn save_answers(&self, attempt_id: i64, answers: &[AnswerInput]) -> Result<Vec<QuizAnswer>, AttemptError> {
        let mut state = self.state.write().await;
        grading::ensure_in_progress(state.attempt_mut(attempt_id)?.status)?;

        for input in answers {
            let question = state
                .questions
                .iter()
                .find(|q| q.id == input.question_id)
                .ok_or_else(|| missing("question", input.question_id))?;
            let question_uuid = question.uuid;
            let selected_option_uuid = input
                .selected_option_id
                .and_then(|id| question.options.iter().find(|o| o.id == id))
                .map(|o| o.uuid);

            let existing = state
                .answers
                .iter()
                .position(|a| a.attempt_id == attempt_id && a.question_id == input.question_id);
            match existing {
                Some(index) => {
                    let answer = &mut state.answers[index];
                    answer.selected_option_id = input.selected_option_id;
                    answer.selected_option_uuid = selected_option_uuid;
                    answer.answer_text = input.answer_text.clone();
                }
                None => {
                    let answer = QuizAnswer {
                        id: state.next_id(),
                        uuid: Uuid::new_v4(),
                        attempt_id,
                        question_id: input.question_id,
                        question_uuid,
                        selected_option_id: input.selected_option_id,
                        selected_option_uuid,
                        answer_text: input.answer_text.clone(),
                        is_correct: None,
                        points_awarded: None,
                        feedback: None,
                    };
                    state.answers.push(answer);
                }
            }
        }
        Ok(state.attempt_answers(attempt_id))
    }

    async fn submit_attempt(&self, attempt_id: i64) -> Result<(QuizAttempt, Vec<QuizAnswer>), AttemptError> {
        let mut state = self.state.write().await;
        let attempt = state.attempt_mut(attempt_id)?;
        grading::ensure_in_progress(attempt.status)?;
        let quiz_id = attempt.quiz_id;

        let questions: Vec<Question> = state.questions.iter().filter(|q| q.quiz_id == quiz_id).cloned().collect();
        let mut answers = state.attempt_answers(attempt_id);
        let (status, score) = grading::grade_submission(&questions, &mut answers);
        state.store_answers(&answers);

        let now = Utc::now();
        let attempt = state.attempt_mut(attempt_id)?;
        attempt.status = status;
        attempt.score = Some(score);
        attempt.submitted_at = Some(now);
        attempt.graded_at = (status == AttemptStatus::Graded).then_some(now);
        Ok((attempt.clone(), answers))
    }

    async fn grade_answer(&self, attempt_id: i64, answer_uuid: Uuid, grade: &ManualGrade) -> Result<(QuizAttempt, QuizAnswer), AttemptError> {
        let mut state = self.state.write().await;
        grading::ensure_submitted(state.attempt_mut(attempt_id)?.status)?;

        let mut answers = state.attempt_answers(attempt_id);
        let index = answers
            .iter()
            .position(|a| a.uuid == answer_uuid)
            .ok_or(grading::GradingError::AnswerNotFound)?;
        let question = state
            .questions
            .iter()
            .find(|q| q.id == answers[index].question_id)
            .cloned()
            .ok_or_else(|| missing("question", answers[index].question_id))?;
        grading::apply_manual_grade(&question, &mut answers[index], grade)?;
        state.store_answers(&answers);

        let status = grading::derive_status(&answers);
        let score = grading::total_score(&answers);
        let attempt = state.attempt_mut(attempt_id)?;
        attempt.status = status;
        attempt.score = Some(score);
        attempt.graded_at = (status == AttemptStatus::Graded).then(Utc::now);
        Ok((attempt.clone(), answers.swap_remove(index)))
    }
}

#[async_trait]
impl TicketRepository for MemoryStore {
    async fn list_tickets(&self, organization_id: i64, author: Option<i64>, limit: i64, offset: i64) -> Result<(Vec<Ticket>, i64), DatabaseError> {
        let state = self.state.read().await;
        let rows = state
            .tickets
            .iter()
            .rev()
            .filter(|t| t.organization_id == organization_id)
            .filter(|t| author.map_or(true, |author| t.author_user_id == author))
            .collect();
        Ok(page(rows, limit, offset))
    }

    async fn find_ticket(&self, uuid: Uuid) -> Result<Option<Ticket>, DatabaseError> {
        Ok(self.state.read().await.tickets.iter().find(|t| t.uuid == uuid).cloned())
    }

    async fn create_ticket(&self, input: &NewTicket) -> Result<(Ticket, TicketReply), DatabaseError> {
        let mut state = self.state.write().await;
        let author_uuid = state.user_uuid(input.author_user_id)?;
        let now = Utc::now();
        let ticket = Ticket {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            organization_id: input.organization_id,
            author_user_id: input.author_user_id,
            author_uuid,
            subject: input.subject.clone(),
            status: TicketStatus::Open,
            created_at: now,
            updated_at: now,
        };
        let reply = TicketReply {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            ticket_id: ticket.id,
            author_user_id: input.author_user_id,
            author_uuid,
            body: input.message.clone(),
            created_at: now,
        };
        state.tickets.push(ticket.clone());
        state.replies.push(reply.clone());
        Ok((ticket, reply))
    }

    async fn list_replies(&self, ticket_id: i64) -> Result<Vec<TicketReply>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.replies.iter().filter(|r| r.ticket_id == ticket_id).cloned().collect())
    }

    async fn add_reply(&self, ticket_id: i64, author_user_id: i64, body: &str, status: Option<TicketStatus>) -> Result<Option<TicketReply>, DatabaseError> {
        let mut state = self.state.write().await;
        let author_uuid = state.user_uuid(author_user_id)?;
        let now = Utc::now();
        let ticket = state
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| missing("ticket", ticket_id))?;
        if ticket.status == TicketStatus::Closed {
            return Ok(None);
        }
        if let Some(status) = status {
            ticket.status = status;
        }
        ticket.updated_at = now;

        let reply = TicketReply {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            ticket_id,
            author_user_id,
            author_uuid,
            body: body.to_string(),
            created_at: now,
        };
        state.replies.push(reply.clone());
        Ok(Some(reply))
    }

    async fn set_ticket_status(&self, id: i64, status: TicketStatus) -> Result<Ticket, DatabaseError> {
        let mut state = self.state.write().await;
        let ticket = state.tickets.iter_mut().find(|t| t.id == id).ok_or_else(|| missing("ticket", id))?;
        ticket.status = status;
        ticket.updated_at = Utc::now();
        Ok(ticket.clone())
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn list_subscriptions(&self, organization_id: i64) -> Result<Vec<Subscription>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.subscriptions.iter().rev().filter(|s| s.organization_id == organization_id).cloned().collect())
    }

    async fn find_subscription(&self, uuid: Uuid) -> Result<Option<Subscription>, DatabaseError> {
        Ok(self.state.read().await.subscriptions.iter().find(|s| s.uuid == uuid).cloned())
    }

    async fn active_subscription(&self, organization_id: i64) -> Result<Option<Subscription>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.organization_id == organization_id && s.status == SubscriptionStatus::Active)
            .cloned())
    }

    async fn create_subscription(&self, organization_id: i64, plan: &str, external_id: &str, checkout_url: &str) -> Result<Subscription, DatabaseError> {
        let mut state = self.state.write().await;
        let subscription = Subscription {
            id: state.next_id(),
            uuid: Uuid::new_v4(),
            organization_id,
            plan: plan.to_string(),
            status: SubscriptionStatus::Pending,
            external_id: Some(external_id.to_string()),
            checkout_url: Some(checkout_url.to_string()),
            created_at: Utc::now(),
            canceled_at: None,
        };
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn cancel_subscription(&self, id: i64) -> Result<Subscription, DatabaseError> {
        let mut state = self.state.write().await;
        let subscription = state
            .subscriptions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| missing("subscription", id))?;
        subscription.status = SubscriptionStatus::Canceled;
        subscription.canceled_at = Some(Utc::now());
        Ok(subscription.clone())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn course(store: &MemoryStore, org: i64) -> Course {
        let input = CourseInput { title: "Rust".into(), description: None, category_id: None, published: false };
        store.create_course(org, CourseKind::Course, &input).await.unwrap()
    }

    fn node(title: &str) -> NewOutlineNode {
        NewOutlineNode { title: title.into(), body: None, document_id: None }
    }

    #[tokio::test]
    async fn new_nodes_append_from_family_base() {
        let store = MemoryStore::new();
        let org = store.seed_organization("A").await;
        let course = course(&store, org.id).await;

        let s0 = store.create_node(OutlineLevel::Section, course.id, &node("one")).await.unwrap();
        let s1 = store.create_node(OutlineLevel::Section, course.id, &node("two")).await.unwrap();
        let o1 = store.create_node(OutlineLevel::Objective, course.id, &node("goal")).await.unwrap();
        assert_eq!((s0.position, s1.position, o1.position), (0, 1, 1));

        let chapter = store.create_node(OutlineLevel::Chapter, s0.id, &node("ch")).await.unwrap();
        assert_eq!(chapter.organization_id, org.id);
        assert_eq!(chapter.course_kind, CourseKind::Course);
    }

    #[tokio::test]
    async fn deleting_course_cascades_outline() {
        let store = MemoryStore::new();
        let org = store.seed_organization("A").await;
        let course = course(&store, org.id).await;
        let section = store.create_node(OutlineLevel::Section, course.id, &node("s")).await.unwrap();
        let chapter = store.create_node(OutlineLevel::Chapter, section.id, &node("c")).await.unwrap();
        let sub = store.create_node(OutlineLevel::SubChapter, chapter.id, &node("sc")).await.unwrap();

        store.delete_course(course.id).await.unwrap();
        assert!(store.find_node(OutlineLevel::Section, section.uuid).await.unwrap().is_none());
        assert!(store.find_node(OutlineLevel::Chapter, chapter.uuid).await.unwrap().is_none());
        assert!(store.find_node(OutlineLevel::SubChapter, sub.uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn positions_are_all_or_nothing() {
        let store = MemoryStore::new();
        let org = store.seed_organization("A").await;
        let course = course(&store, org.id).await;
        let a = store.create_node(OutlineLevel::Section, course.id, &node("a")).await.unwrap();

        let err = store.apply_positions(OutlineLevel::Section, course.id, &[(a.id, 5), (9999, 6)]).await;
        assert!(err.is_err());
        let nodes = store.list_nodes(OutlineLevel::Section, course.id).await.unwrap();
        assert_eq!(nodes[0].position, 0);
    }

    #[tokio::test]
    async fn category_names_are_unique_per_tenant() {
        let store = MemoryStore::new();
        let a = store.seed_organization("A").await;
        let b = store.seed_organization("B").await;

        store.create_category(a.id, "Sales").await.unwrap();
        assert!(matches!(
            store.create_category(a.id, " sales ").await,
            Err(DatabaseError::UniqueViolation(_))
        ));
        assert!(store.create_category(b.id, "Sales").await.is_ok());
        assert!(store.category_name_taken(a.id, "SALES", None).await.unwrap());
    }

    #[tokio::test]
    async fn replies_to_closed_tickets_are_refused() {
        let store = MemoryStore::new();
        let org = store.seed_organization("A").await;
        let user = store.seed_user("Stu", Role::Student, Some(org.id)).await;
        let (ticket, first) = store
            .create_ticket(&NewTicket {
                organization_id: org.id,
                author_user_id: user.id,
                subject: "Help".into(),
                message: "Stuck".into(),
            })
            .await
            .unwrap();
        assert_eq!(first.ticket_id, ticket.id);

        store.set_ticket_status(ticket.id, TicketStatus::Closed).await.unwrap();
        assert!(store.add_reply(ticket.id, user.id, "Again", None).await.unwrap().is_none());
        assert_eq!(store.list_replies(ticket.id).await.unwrap().len(), 1);
    }
}
