//! Manual evaluation and the revaluation appeal workflow. The main
//! lifecycle moves in-progress -> submitted -> evaluated; the appeal
//! sub-state moves pending -> approved | denied and never back.

use serde::Deserialize;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Question, Submission, User};
use crate::db::types::{RevaluationStatus, SubmissionStatus, UserRole};
use crate::repositories;
use crate::services::errors::EngineError;
use crate::services::scoring::{self, GradedAnswer};

/// Per-question points override supplied by a grader.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ManualGrade {
    pub(crate) question_id: String,
    pub(crate) points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RevaluationDecision {
    Approved,
    Denied,
}

impl RevaluationDecision {
    fn as_status(self) -> RevaluationStatus {
        match self {
            Self::Approved => RevaluationStatus::Approved,
            Self::Denied => RevaluationStatus::Denied,
        }
    }
}

fn ensure_grader(quiz_creator_id: &str, grader: &User) -> Result<(), EngineError> {
    if grader.role == UserRole::Admin || quiz_creator_id == grader.id {
        return Ok(());
    }
    Err(EngineError::Authorization("only the quiz owner or an admin may grade"))
}

/// An appeal can only be handled while it is pending; approved and
/// denied are terminal.
pub(crate) fn ensure_revaluation_pending(submission: &Submission) -> Result<(), EngineError> {
    if submission.revaluation_status != Some(RevaluationStatus::Pending) {
        return Err(EngineError::policy("no pending revaluation for this attempt"));
    }
    Ok(())
}

/// Applies explicit point overrides to graded answers. An override marks
/// the answer correct iff it awards more than zero points.
pub(crate) fn apply_manual_grades(
    graded: &mut [GradedAnswer],
    grades: &[ManualGrade],
    questions: &[Question],
) -> Result<(), EngineError> {
    for grade in grades {
        let question = questions
            .iter()
            .find(|question| question.id == grade.question_id)
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "manual grade references unknown question {}",
                    grade.question_id
                ))
            })?;

        if grade.points < 0.0 || grade.points > question.points {
            return Err(EngineError::validation(format!(
                "manual grade for question {} must be between 0 and {}",
                grade.question_id, question.points
            )));
        }

        let answer = graded
            .iter_mut()
            .find(|answer| answer.question_id == grade.question_id)
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "no recorded answer for question {}",
                    grade.question_id
                ))
            })?;

        answer.points_awarded = grade.points;
        answer.is_correct = grade.points > 0.0;
        answer.needs_manual = false;
    }

    Ok(())
}

async fn regrade(
    state: &AppState,
    submission: &Submission,
    grades: &[ManualGrade],
) -> Result<(Vec<GradedAnswer>, scoring::Score, Vec<Question>), EngineError> {
    let questions =
        repositories::questions::list_by_quiz(state.db(), &submission.quiz_id).await?;
    let mut graded = scoring::answers_from_json(&submission.answers.0)?;
    apply_manual_grades(&mut graded, grades, &questions)?;
    let score = scoring::compute_score(&graded, &questions);
    Ok((graded, score, questions))
}

pub(crate) async fn evaluate_manually(
    state: &AppState,
    submission_id: &str,
    grader: &User,
    feedback: Option<&str>,
    manual_grades: &[ManualGrade],
) -> Result<Submission, EngineError> {
    let now = primitive_now_utc();

    let submission = repositories::submissions::find_by_id(state.db(), submission_id)
        .await?
        .ok_or(EngineError::NotFound("submission"))?;
    if submission.status == SubmissionStatus::InProgress {
        return Err(EngineError::policy("attempt has not been submitted yet"));
    }

    let quiz = repositories::quizzes::find_by_id(state.db(), &submission.quiz_id)
        .await?
        .ok_or(EngineError::NotFound("quiz"))?;
    ensure_grader(&quiz.creator_id, grader)?;

    let (graded, score, questions) = regrade(state, &submission, manual_grades).await?;

    // AI feedback is an enhancement. A collaborator failure is absorbed
    // and the evaluation completes without insights.
    let ai_insights = if submission.ai_insights.is_none() {
        match state.ai() {
            Some(ai) => match ai.evaluate_submission(&quiz, &questions, &graded, &score).await {
                Ok(insights) => serde_json::to_value(insights).ok(),
                Err(err) => {
                    tracing::warn!(submission_id, error = %err, "AI insight fetch failed");
                    metrics::counter!("ai_insight_failures_total").increment(1);
                    None
                }
            },
            None => None,
        }
    } else {
        None
    };

    let updated = repositories::submissions::apply_evaluation(
        state.db(),
        submission_id,
        repositories::submissions::EvaluationUpdate {
            answers: scoring::answers_to_json(&graded),
            score_total: score.total,
            score_percentage: score.percentage,
            grade: score.grade.as_str(),
            evaluated_by: &grader.id,
            feedback,
            ai_insights,
            now,
        },
    )
    .await?;

    if updated == 0 {
        return Err(EngineError::policy("attempt cannot be evaluated in its current state"));
    }

    tracing::info!(
        submission_id,
        grader_id = %grader.id,
        percentage = score.percentage,
        grade = score.grade.as_str(),
        "attempt evaluated"
    );
    metrics::counter!("evaluations_total").increment(1);

    repositories::submissions::find_by_id(state.db(), submission_id)
        .await?
        .ok_or(EngineError::NotFound("submission"))
}

pub(crate) async fn request_revaluation(
    state: &AppState,
    submission_id: &str,
    student: &User,
    reason: &str,
) -> Result<Submission, EngineError> {
    if reason.trim().is_empty() {
        return Err(EngineError::validation("revaluation reason must not be empty"));
    }

    let submission = repositories::submissions::find_by_id(state.db(), submission_id)
        .await?
        .ok_or(EngineError::NotFound("submission"))?;
    if submission.student_id != student.id {
        return Err(EngineError::Authorization("submission belongs to another student"));
    }

    let now = primitive_now_utc();
    let updated =
        repositories::submissions::request_revaluation(state.db(), submission_id, reason, now)
            .await?;

    if updated == 0 {
        return Err(EngineError::policy(
            "revaluation can only be requested once, on an evaluated attempt",
        ));
    }

    tracing::info!(submission_id, student_id = %student.id, "revaluation requested");

    repositories::submissions::find_by_id(state.db(), submission_id)
        .await?
        .ok_or(EngineError::NotFound("submission"))
}

pub(crate) async fn handle_revaluation(
    state: &AppState,
    submission_id: &str,
    grader: &User,
    decision: RevaluationDecision,
    response: Option<&str>,
    new_grades: Option<&[ManualGrade]>,
) -> Result<Submission, EngineError> {
    let submission = repositories::submissions::find_by_id(state.db(), submission_id)
        .await?
        .ok_or(EngineError::NotFound("submission"))?;

    let quiz = repositories::quizzes::find_by_id(state.db(), &submission.quiz_id)
        .await?
        .ok_or(EngineError::NotFound("quiz"))?;
    ensure_grader(&quiz.creator_id, grader)?;

    ensure_revaluation_pending(&submission)?;

    // Denial never touches the score; approval regrades only when new
    // overrides are supplied.
    let regraded = match (decision, new_grades) {
        (RevaluationDecision::Approved, Some(grades)) if !grades.is_empty() => {
            let (graded, score, _) = regrade(state, &submission, grades).await?;
            Some((graded, score))
        }
        _ => None,
    };

    let now = primitive_now_utc();
    let updated = repositories::submissions::handle_revaluation(
        state.db(),
        submission_id,
        repositories::submissions::HandleRevaluation {
            decision: decision.as_status(),
            handled_by: &grader.id,
            response,
            answers: regraded.as_ref().map(|(graded, _)| scoring::answers_to_json(graded)),
            score_total: regraded.as_ref().map(|(_, score)| score.total),
            score_percentage: regraded.as_ref().map(|(_, score)| score.percentage),
            grade: regraded.as_ref().map(|(_, score)| score.grade.as_str()),
            now,
        },
    )
    .await?;

    if updated == 0 {
        return Err(EngineError::policy("no pending revaluation for this attempt"));
    }

    tracing::info!(submission_id, grader_id = %grader.id, ?decision, "revaluation handled");

    repositories::submissions::find_by_id(state.db(), submission_id)
        .await?
        .ok_or(EngineError::NotFound("submission"))
}

#[cfg(test)]
mod tests {
    use sqlx::types::Json;
    use time::{Date, Month, PrimitiveDateTime, Time};

    use super::*;
    use crate::db::models::QuestionOption;
    use crate::db::types::QuestionKind;
    use crate::services::scoring::{compute_score, AnswerValue, LetterGrade};

    fn at(hour: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, Month::May, 20).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, 0, 0).unwrap())
    }

    fn evaluated_submission(revaluation_status: Option<RevaluationStatus>) -> Submission {
        Submission {
            id: "sub-1".to_string(),
            quiz_id: "quiz-1".to_string(),
            student_id: "student-1".to_string(),
            status: SubmissionStatus::Evaluated,
            answers: Json(serde_json::json!([])),
            score_total: 8.0,
            score_percentage: 80.0,
            grade: Some("B".to_string()),
            started_at: at(9),
            ended_at: Some(at(10)),
            total_time_seconds: Some(3600),
            time_limit_seconds: None,
            auto_graded: true,
            evaluated_by: None,
            evaluated_at: Some(at(10)),
            feedback: None,
            ai_insights: None,
            revaluation_requested: revaluation_status.is_some(),
            revaluation_status,
            revaluation_requested_at: None,
            revaluation_reason: None,
            revaluation_handled_by: None,
            revaluation_handled_at: None,
            revaluation_response: None,
            created_at: at(9),
            updated_at: at(10),
        }
    }

    fn essay_question(id: &str, points: f64) -> Question {
        Question {
            id: id.to_string(),
            quiz_id: "quiz-1".to_string(),
            kind: QuestionKind::Essay,
            prompt: format!("prompt {id}"),
            options: Json(Vec::new()),
            correct_answer: None,
            points,
            order_index: 0,
        }
    }

    fn essay_answer(question_id: &str) -> GradedAnswer {
        GradedAnswer {
            question_id: question_id.to_string(),
            answer: Some(AnswerValue::Essay { text: "an essay".to_string() }),
            is_correct: false,
            points_awarded: 0.0,
            needs_manual: true,
        }
    }

    #[test]
    fn override_awards_points_and_clears_manual_flag() {
        let questions = vec![essay_question("q1", 10.0)];
        let mut graded = vec![essay_answer("q1")];

        let grades = vec![ManualGrade { question_id: "q1".to_string(), points: 7.5 }];
        apply_manual_grades(&mut graded, &grades, &questions).expect("applied");

        assert_eq!(graded[0].points_awarded, 7.5);
        assert!(graded[0].is_correct);
        assert!(!graded[0].needs_manual);
    }

    #[test]
    fn zero_point_override_marks_incorrect() {
        let questions = vec![essay_question("q1", 10.0)];
        let mut graded = vec![essay_answer("q1")];

        let grades = vec![ManualGrade { question_id: "q1".to_string(), points: 0.0 }];
        apply_manual_grades(&mut graded, &grades, &questions).expect("applied");

        assert!(!graded[0].is_correct);
        assert!(!graded[0].needs_manual);
    }

    #[test]
    fn override_for_unknown_question_is_rejected() {
        let questions = vec![essay_question("q1", 10.0)];
        let mut graded = vec![essay_answer("q1")];

        let grades = vec![ManualGrade { question_id: "ghost".to_string(), points: 5.0 }];
        let result = apply_manual_grades(&mut graded, &grades, &questions);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn override_outside_point_range_is_rejected() {
        let questions = vec![essay_question("q1", 10.0)];
        let mut graded = vec![essay_answer("q1")];

        let over = vec![ManualGrade { question_id: "q1".to_string(), points: 10.5 }];
        assert!(apply_manual_grades(&mut graded, &over, &questions).is_err());

        let negative = vec![ManualGrade { question_id: "q1".to_string(), points: -1.0 }];
        assert!(apply_manual_grades(&mut graded, &negative, &questions).is_err());
    }

    #[test]
    fn recomputed_score_reflects_overrides() {
        let questions = vec![essay_question("q1", 10.0), essay_question("q2", 10.0)];
        let mut graded = vec![essay_answer("q1"), essay_answer("q2")];

        let grades = vec![
            ManualGrade { question_id: "q1".to_string(), points: 10.0 },
            ManualGrade { question_id: "q2".to_string(), points: 9.0 },
        ];
        apply_manual_grades(&mut graded, &grades, &questions).expect("applied");

        let score = compute_score(&graded, &questions);
        assert_eq!(score.total, 19.0);
        assert_eq!(score.percentage, 95.0);
        assert_eq!(score.grade, LetterGrade::APlus);
    }

    #[test]
    fn pending_revaluation_can_be_handled() {
        let submission = evaluated_submission(Some(RevaluationStatus::Pending));
        assert!(ensure_revaluation_pending(&submission).is_ok());
    }

    #[test]
    fn handled_or_unrequested_revaluation_is_rejected() {
        for status in [Some(RevaluationStatus::Approved), Some(RevaluationStatus::Denied), None] {
            let submission = evaluated_submission(status);
            assert!(matches!(
                ensure_revaluation_pending(&submission),
                Err(EngineError::Policy(_))
            ));
        }
    }

    #[test]
    fn decision_parses_from_lowercase() {
        let approved: RevaluationDecision = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(approved, RevaluationDecision::Approved);
        let denied: RevaluationDecision = serde_json::from_str("\"denied\"").unwrap();
        assert_eq!(denied, RevaluationDecision::Denied);
    }
}
