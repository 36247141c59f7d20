use thiserror::Error;

use crate::database::models::{AttemptStatus, ManualGrade, Question, QuizAnswer};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradingError {
    #[error("Attempt is already {0:?}")]
    NotInProgress(AttemptStatus),

    #[error("Attempt has not been submitted yet")]
    NotSubmitted,

    #[error("Answer not found in this attempt")]
    AnswerNotFound,

    #[error("Points must be between 0 and {max}")]
    PointsOutOfRange { max: i32 },
}

pub fn ensure_in_progress(status: AttemptStatus) -> Result<(), GradingError> {
    match status {
        AttemptStatus::InProgress => Ok(()),
        other => Err(GradingError::NotInProgress(other)),
    }
}

pub fn ensure_submitted(status: AttemptStatus) -> Result<(), GradingError> {
    match status {
        AttemptStatus::InProgress => Err(GradingError::NotSubmitted),
        _ => Ok(()),
    }
}

/// Graded iff every answer carries a correctness verdict. An attempt without
/// answers is vacuously graded.
pub fn derive_status(answers: &[QuizAnswer]) -> AttemptStatus {
    if answers.iter().all(|a| a.is_correct.is_some()) {
        AttemptStatus::Graded
    } else {
        AttemptStatus::Submitted
    }
}

pub fn total_score(answers: &[QuizAnswer]) -> i32 {
    answers.iter().filter_map(|a| a.points_awarded).sum()
}

/// Verdict for an objective question; `None` for free text
pub fn auto_grade(question: &Question, answer: &QuizAnswer) -> Option<(bool, i32)> {
    if !question.kind.is_auto_graded() {
        return None;
    }
    let correct = answer
        .selected_option_id
        .and_then(|selected| question.options.iter().find(|o| o.id == selected))
        .map_or(false, |option| option.is_correct);
    Some((correct, if correct { question.points } else { 0 }))
}

/// Auto-grade every objective answer in place and return the resulting status and score
pub fn grade_submission(questions: &[Question], answers: &mut [QuizAnswer]) -> (AttemptStatus, i32) {
    for answer in answers.iter_mut() {
        let Some(question) = questions.iter().find(|q| q.id == answer.question_id) else {
            continue;
        };
        if let Some((correct, points)) = auto_grade(question, answer) {
            answer.is_correct = Some(correct);
            answer.points_awarded = Some(points);
        }
    }
    (derive_status(answers), total_score(answers))
}

/// Apply a manual verdict to one answer
pub fn apply_manual_grade(question: &Question, answer: &mut QuizAnswer, grade: &ManualGrade) -> Result<(), GradingError> {
    if grade.points < 0 || grade.points > question.points {
        return Err(GradingError::PointsOutOfRange { max: question.points });
    }
    answer.is_correct = Some(grade.is_correct);
    answer.points_awarded = Some(grade.points);
    answer.feedback = grade.feedback.clone();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{QuestionKind, QuestionOption};
    use uuid::Uuid;

    fn question(id: i64, kind: QuestionKind, points: i32, correct_option: Option<i64>) -> Question {
        let options = match kind {
            QuestionKind::FreeText => vec![],
            _ => (1..=2)
                .map(|n| QuestionOption {
                    id: id * 10 + n,
                    uuid: Uuid::new_v4(),
                    question_id: id,
                    label: format!("option {n}"),
                    is_correct: Some(id * 10 + n) == correct_option,
                    position: n as i32,
                })
                .collect(),
        };
        Question {
            id,
            uuid: Uuid::new_v4(),
            quiz_id: 1,
            organization_id: 1,
            kind,
            prompt: "?".into(),
            points,
            position: id as i32,
            options,
        }
    }

    fn answer(question_id: i64, selected: Option<i64>) -> QuizAnswer {
        QuizAnswer {
            id: question_id,
            uuid: Uuid::new_v4(),
            attempt_id: 1,
            question_id,
            question_uuid: Uuid::new_v4(),
            selected_option_id: selected,
            selected_option_uuid: None,
            answer_text: None,
            is_correct: None,
            points_awarded: None,
            feedback: None,
        }
    }

    #[test]
    fn objective_only_submission_is_graded() {
        let questions = vec![
            question(1, QuestionKind::MultipleChoice, 5, Some(11)),
            question(2, QuestionKind::TrueFalse, 3, Some(22)),
        ];
        let mut answers = vec![answer(1, Some(11)), answer(2, Some(21))];

        let (status, score) = grade_submission(&questions, &mut answers);
        assert_eq!(status, AttemptStatus::Graded);
        assert_eq!(score, 5);
        assert_eq!(answers[1].is_correct, Some(false));
        assert_eq!(answers[1].points_awarded, Some(0));
    }

    #[test]
    fn free_text_keeps_attempt_submitted_until_graded() {
        let questions = vec![
            question(1, QuestionKind::MultipleChoice, 5, Some(11)),
            question(2, QuestionKind::FreeText, 10, None),
        ];
        let mut answers = vec![answer(1, Some(11)), answer(2, None)];

        let (status, _) = grade_submission(&questions, &mut answers);
        assert_eq!(status, AttemptStatus::Submitted);
        assert_eq!(answers[1].is_correct, None);

        let grade = ManualGrade { is_correct: true, points: 7, feedback: Some("Good".into()) };
        apply_manual_grade(&questions[1], &mut answers[1], &grade).unwrap();
        assert_eq!(derive_status(&answers), AttemptStatus::Graded);
        assert_eq!(total_score(&answers), 12);
    }

    #[test]
    fn unanswered_choice_counts_as_wrong() {
        let q = question(1, QuestionKind::MultipleChoice, 4, Some(11));
        assert_eq!(auto_grade(&q, &answer(1, None)), Some((false, 0)));
    }

    #[test]
    fn empty_submission_is_vacuously_graded() {
        assert_eq!(derive_status(&[]), AttemptStatus::Graded);
        assert_eq!(total_score(&[]), 0);
    }

    #[test]
    fn manual_points_are_bounded_by_question() {
        let q = question(1, QuestionKind::FreeText, 10, None);
        let mut a = answer(1, None);
        let too_many = ManualGrade { is_correct: true, points: 11, feedback: None };
        assert_eq!(
            apply_manual_grade(&q, &mut a, &too_many),
            Err(GradingError::PointsOutOfRange { max: 10 })
        );
        let negative = ManualGrade { is_correct: false, points: -1, feedback: None };
        assert!(apply_manual_grade(&q, &mut a, &negative).is_err());
        assert_eq!(a.is_correct, None);
    }

    #[test]
    fn status_gates() {
        assert!(ensure_in_progress(AttemptStatus::InProgress).is_ok());
        assert_eq!(
            ensure_in_progress(AttemptStatus::Graded),
            Err(GradingError::NotInProgress(AttemptStatus::Graded))
        );
        assert_eq!(ensure_submitted(AttemptStatus::InProgress), Err(GradingError::NotSubmitted));
        assert!(ensure_submitted(AttemptStatus::Submitted).is_ok());
    }
}
