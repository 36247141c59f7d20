use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::*;
use crate::database::repository::{AttemptError, QuizRepository};
use crate::services::grading::{self, GradingError};

const QUIZ_SELECT: &str = "SELECT q.id, q.uuid, q.organization_id, q.course_id, c.uuid AS course_uuid, \
     q.title, q.pass_mark, q.created_at FROM quizzes q LEFT JOIN courses c ON c.id = q.course_id";

const QUESTION_SELECT: &str = "SELECT qu.id, qu.uuid, qu.quiz_id, qz.organization_id, qu.kind, qu.prompt, \
     qu.points, qu.position FROM questions qu JOIN quizzes qz ON qz.id = qu.quiz_id";

const ATTEMPT_SELECT: &str = "SELECT a.id, a.uuid, a.quiz_id, qz.uuid AS quiz_uuid, a.organization_id, \
     a.user_id, u.uuid AS user_uuid, a.status, a.score, a.started_at, a.submitted_at, a.graded_at \
     FROM quiz_attempts a JOIN quizzes qz ON qz.id = a.quiz_id JOIN users u ON u.id = a.user_id";

const ANSWER_SELECT: &str = "SELECT an.id, an.uuid, an.attempt_id, an.question_id, qu.uuid AS question_uuid, \
     an.selected_option_id, o.uuid AS selected_option_uuid, an.answer_text, an.is_correct, \
     an.points_awarded, an.feedback FROM quiz_answers an JOIN questions qu ON qu.id = an.question_id \
     LEFT JOIN question_options o ON o.id = an.selected_option_id";

async fn attach_options(conn: &mut PgConnection, questions: &mut [Question]) -> Result<(), DatabaseError> {
    if questions.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
    let options = sqlx::query_as::<_, QuestionOption>(
        "SELECT id, uuid, question_id, label, is_correct, position FROM question_options \
         WHERE question_id = ANY($1) ORDER BY position, id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    for option in options {
        if let Some(question) = questions.iter_mut().find(|q| q.id == option.question_id) {
            question.options.push(option);
        }
    }
    Ok(())
}

async fn quiz_questions(conn: &mut PgConnection, quiz_id: i64) -> Result<Vec<Question>, DatabaseError> {
    let sql = format!("{} WHERE qu.quiz_id = $1 ORDER BY qu.position, qu.id", QUESTION_SELECT);
    let mut questions = sqlx::query_as::<_, Question>(&sql)
        .bind(quiz_id)
        .fetch_all(&mut *conn)
        .await?;
    attach_options(conn, &mut questions).await?;
    Ok(questions)
}

async fn attempt_answers(conn: &mut PgConnection, attempt_id: i64) -> Result<Vec<QuizAnswer>, DatabaseError> {
    let sql = format!("{} WHERE an.attempt_id = $1 ORDER BY qu.position, an.id", ANSWER_SELECT);
    Ok(sqlx::query_as::<_, QuizAnswer>(&sql)
        .bind(attempt_id)
        .fetch_all(&mut *conn)
        .await?)
}

async fn attempt_by_id(conn: &mut PgConnection, attempt_id: i64) -> Result<QuizAttempt, DatabaseError> {
    let sql = format!("{} WHERE a.id = $1", ATTEMPT_SELECT);
    sqlx::query_as::<_, QuizAttempt>(&sql)
        .bind(attempt_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("attempt {}", attempt_id)))
}

/// Row-lock the attempt for the rest of the transaction and return its status and quiz
async fn lock_attempt(conn: &mut PgConnection, attempt_id: i64) -> Result<(AttemptStatus, i64), DatabaseError> {
    sqlx::query_as::<_, (AttemptStatus, i64)>("SELECT status, quiz_id FROM quiz_attempts WHERE id = $1 FOR UPDATE")
        .bind(attempt_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("attempt {}", attempt_id)))
}

async fn store_verdicts(conn: &mut PgConnection, answers: &[QuizAnswer]) -> Result<(), DatabaseError> {
    for answer in answers {
        sqlx::query("UPDATE quiz_answers SET is_correct = $2, points_awarded = $3, feedback = $4 WHERE id = $1")
            .bind(answer.id)
            .bind(answer.is_correct)
            .bind(answer.points_awarded)
            .bind(&answer.feedback)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl QuizRepository for PgStore {
    async fn list_quizzes(&self, organization_id: i64) -> Result<Vec<Quiz>, DatabaseError> {
        let sql = format!("{} WHERE q.organization_id = $1 ORDER BY q.created_at DESC, q.id DESC", QUIZ_SELECT);
        Ok(sqlx::query_as::<_, Quiz>(&sql)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_quiz(&self, uuid: Uuid) -> Result<Option<Quiz>, DatabaseError> {
        let sql = format!("{} WHERE q.uuid = $1", QUIZ_SELECT);
        Ok(sqlx::query_as::<_, Quiz>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_quiz(&self, input: &NewQuiz) -> Result<Quiz, DatabaseError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO quizzes (organization_id, course_id, title, pass_mark) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(input.organization_id)
        .bind(input.course_id)
        .bind(&input.title)
        .bind(input.pass_mark)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!("{} WHERE q.id = $1", QUIZ_SELECT);
        Ok(sqlx::query_as::<_, Quiz>(&sql).bind(id).fetch_one(&self.pool).await?)
    }

    async fn delete_quiz(&self, id: i64) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<Question>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        quiz_questions(&mut conn, quiz_id).await
    }

    async fn find_question(&self, uuid: Uuid) -> Result<Option<Question>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("{} WHERE qu.uuid = $1", QUESTION_SELECT);
        let Some(question) = sqlx::query_as::<_, Question>(&sql)
            .bind(uuid)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };
        let mut found = [question];
        attach_options(&mut conn, &mut found).await?;
        let [question] = found;
        Ok(Some(question))
    }

    async fn create_question(&self, quiz_id: i64, input: &NewQuestion) -> Result<Question, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO questions (quiz_id, kind, prompt, points, position) \
             VALUES ($1, $2, $3, $4, COALESCE((SELECT MAX(position) + 1 FROM questions WHERE quiz_id = $1), 1)) \
             RETURNING id",
        )
        .bind(quiz_id)
        .bind(input.kind)
        .bind(&input.prompt)
        .bind(input.points)
        .fetch_one(&mut *tx)
        .await?;

        for (index, option) in input.options.iter().enumerate() {
            sqlx::query("INSERT INTO question_options (question_id, label, is_correct, position) VALUES ($1, $2, $3, $4)")
                .bind(id)
                .bind(&option.label)
                .bind(option.is_correct)
                .bind(index as i32 + 1)
                .execute(&mut *tx)
                .await?;
        }

        let sql = format!("{} WHERE qu.id = $1", QUESTION_SELECT);
        let mut created = [sqlx::query_as::<_, Question>(&sql).bind(id).fetch_one(&mut *tx).await?];
        attach_options(&mut tx, &mut created).await?;
        tx.commit().await?;

        let [question] = created;
        Ok(question)
    }

    async fn delete_question(&self, id: i64) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_finished_attempts(&self, quiz_id: i64) -> Result<i64, DatabaseError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = $1 AND status <> $2")
            .bind(quiz_id)
            .bind(AttemptStatus::InProgress)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn start_attempt(&self, quiz_id: i64, organization_id: i64, user_id: i64) -> Result<QuizAttempt, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO quiz_attempts (quiz_id, organization_id, user_id, status) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(quiz_id)
        .bind(organization_id)
        .bind(user_id)
        .bind(AttemptStatus::InProgress)
        .fetch_one(&mut *conn)
        .await?;
        attempt_by_id(&mut conn, id).await
    }

    async fn find_attempt(&self, uuid: Uuid) -> Result<Option<QuizAttempt>, DatabaseError> {
        let sql = format!("{} WHERE a.uuid = $1", ATTEMPT_SELECT);
        Ok(sqlx::query_as::<_, QuizAttempt>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_answers(&self, attempt_id: i64) -> Result<Vec<QuizAnswer>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        attempt_answers(&mut conn, attempt_id).await
    }

    async fn save_answers(&self, attempt_id: i64, answers: &[AnswerInput]) -> Result<Vec<QuizAnswer>, AttemptError> {
        let mut tx = self.pool.begin().await?;
        let (status, _) = lock_attempt(&mut tx, attempt_id).await?;
        grading::ensure_in_progress(status)?;

        for answer in answers {
            sqlx::query(
                "INSERT INTO quiz_answers (attempt_id, question_id, selected_option_id, answer_text) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (attempt_id, question_id) DO UPDATE \
                 SET selected_option_id = EXCLUDED.selected_option_id, answer_text = EXCLUDED.answer_text",
            )
            .bind(attempt_id)
            .bind(answer.question_id)
            .bind(answer.selected_option_id)
            .bind(&answer.answer_text)
            .execute(&mut *tx)
            .await?;
        }

        let saved = attempt_answers(&mut tx, attempt_id).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn submit_attempt(&self, attempt_id: i64) -> Result<(QuizAttempt, Vec<QuizAnswer>), AttemptError> {
        let mut tx = self.pool.begin().await?;
        let (status, quiz_id) = lock_attempt(&mut tx, attempt_id).await?;
        grading::ensure_in_progress(status)?;

        let questions = quiz_questions(&mut tx, quiz_id).await?;
        let mut answers = attempt_answers(&mut tx, attempt_id).await?;
        let (status, score) = grading::grade_submission(&questions, &mut answers);
        store_verdicts(&mut tx, &answers).await?;

        let now = Utc::now();
        sqlx::query("UPDATE quiz_attempts SET status = $2, score = $3, submitted_at = $4, graded_at = $5 WHERE id = $1")
            .bind(attempt_id)
            .bind(status)
            .bind(score)
            .bind(now)
            .bind((status == AttemptStatus::Graded).then_some(now))
            .execute(&mut *tx)
            .await?;

        let attempt = attempt_by_id(&mut tx, attempt_id).await?;
        tx.commit().await?;
        Ok((attempt, answers))
    }

    async fn grade_answer(&self, attempt_id: i64, answer_uuid: Uuid, grade: &ManualGrade) -> Result<(QuizAttempt, QuizAnswer), AttemptError> {
        let mut tx = self.pool.begin().await?;
        let (status, quiz_id) = lock_attempt(&mut tx, attempt_id).await?;
        grading::ensure_submitted(status)?;

        let mut answers = attempt_answers(&mut tx, attempt_id).await?;
        let index = answers
            .iter()
            .position(|a| a.uuid == answer_uuid)
            .ok_or(GradingError::AnswerNotFound)?;
        let questions = quiz_questions(&mut tx, quiz_id).await?;
        let question = questions
            .iter()
            .find(|q| q.id == answers[index].question_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("question {}", answers[index].question_id)))?;

        grading::apply_manual_grade(question, &mut answers[index], grade)?;
        store_verdicts(&mut tx, &answers[index..=index]).await?;

        let status = grading::derive_status(&answers);
        let score = grading::total_score(&answers);
        sqlx::query("UPDATE quiz_attempts SET status = $2, score = $3, graded_at = $4 WHERE id = $1")
            .bind(attempt_id)
            .bind(status)
            .bind(score)
            .bind((status == AttemptStatus::Graded).then(Utc::now))
            .execute(&mut *tx)
            .await?;

        let attempt = attempt_by_id(&mut tx, attempt_id).await?;
        tx.commit().await?;
        Ok((attempt, answers.swap_remove(index)))
    }
}
