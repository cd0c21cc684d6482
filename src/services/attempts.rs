//! Attempt lifecycle: eligibility checks, the one-active-attempt
//! guarantee, time-limit enforcement and finalization.

use serde::Serialize;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Question, Quiz, Submission, User};
use crate::db::types::{QuestionKind, QuizStatus, SubmissionStatus};
use crate::repositories;
use crate::services::errors::EngineError;
use crate::services::scoring::{self, SubmittedAnswer};
use crate::services::stats;

/// Question view handed to a student at attempt start. Option correctness
/// flags and expected answers are stripped.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SanitizedQuestion {
    pub(crate) id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) options: Vec<String>,
    pub(crate) points: f64,
    pub(crate) order_index: i32,
}

pub(crate) struct AttemptStart {
    pub(crate) submission: Submission,
    pub(crate) quiz: Quiz,
    pub(crate) questions: Vec<SanitizedQuestion>,
}

pub(crate) fn sanitize_question(question: &Question) -> SanitizedQuestion {
    SanitizedQuestion {
        id: question.id.clone(),
        kind: question.kind,
        prompt: question.prompt.clone(),
        options: question.options.0.iter().map(|option| option.text.clone()).collect(),
        points: question.points,
        order_index: question.order_index,
    }
}

/// Published and inside the schedule window.
pub(crate) fn ensure_quiz_open(quiz: &Quiz, now: PrimitiveDateTime) -> Result<(), EngineError> {
    if quiz.status != QuizStatus::Published {
        return Err(EngineError::policy("quiz is not published"));
    }
    if quiz.opens_at.is_some_and(|opens| now < opens) {
        return Err(EngineError::policy("quiz has not opened yet"));
    }
    if quiz.closes_at.is_some_and(|closes| now > closes) {
        return Err(EngineError::policy("quiz has closed"));
    }
    Ok(())
}

/// Time-limit check against elapsed wall time. `grace_seconds` extends the
/// limit to absorb client submit latency.
pub(crate) fn check_time_limit(
    elapsed_seconds: i64,
    limit_seconds: Option<i64>,
    grace_seconds: i64,
) -> Result<(), EngineError> {
    if let Some(limit) = limit_seconds {
        if elapsed_seconds > limit + grace_seconds {
            return Err(EngineError::TimeExceeded {
                elapsed_seconds,
                limit_seconds: limit,
            });
        }
    }
    Ok(())
}

pub(crate) async fn start_attempt(
    state: &AppState,
    quiz_id: &str,
    student: &User,
) -> Result<AttemptStart, EngineError> {
    let now = primitive_now_utc();

    let quiz = repositories::quizzes::find_by_id(state.db(), quiz_id)
        .await?
        .ok_or(EngineError::NotFound("quiz"))?;
    ensure_quiz_open(&quiz, now)?;

    if !quiz.is_public
        && !repositories::quizzes::is_student_assigned(state.db(), quiz_id, &student.id).await?
    {
        return Err(EngineError::Authorization("quiz is not assigned to this student"));
    }

    let mut tx = state.db().begin().await?;

    // The advisory lock orders concurrent starts from the same student; the
    // partial unique index backstops anything the lock does not cover.
    repositories::submissions::acquire_attempt_lock(&mut *tx, quiz_id, &student.id).await?;

    if let Some(existing) =
        repositories::submissions::find_in_progress(&mut *tx, quiz_id, &student.id).await?
    {
        return Err(EngineError::Conflict { existing_submission_id: existing.id });
    }

    if !quiz.allow_retake
        && repositories::submissions::has_finalized(&mut *tx, quiz_id, &student.id).await?
    {
        return Err(EngineError::policy("retakes are not allowed for this quiz"));
    }

    let submission_id = Uuid::new_v4().to_string();
    let time_limit_seconds = quiz.time_limit_minutes.map(|minutes| i64::from(minutes) * 60);

    let created = repositories::submissions::create(
        &mut *tx,
        repositories::submissions::CreateSubmission {
            id: &submission_id,
            quiz_id,
            student_id: &student.id,
            started_at: now,
            time_limit_seconds,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    if !created {
        let existing =
            repositories::submissions::find_in_progress(&mut *tx, quiz_id, &student.id).await?;
        return Err(EngineError::Conflict {
            existing_submission_id: existing.map(|s| s.id).unwrap_or_default(),
        });
    }

    tx.commit().await?;

    let submission = repositories::submissions::find_by_id(state.db(), &submission_id)
        .await?
        .ok_or(EngineError::NotFound("submission"))?;
    let questions = repositories::questions::list_by_quiz(state.db(), quiz_id).await?;

    tracing::info!(quiz_id, student_id = %student.id, submission_id, "attempt started");
    metrics::counter!("attempts_started_total").increment(1);

    Ok(AttemptStart {
        submission,
        quiz,
        questions: questions.iter().map(sanitize_question).collect(),
    })
}

pub(crate) async fn submit_attempt(
    state: &AppState,
    submission_id: &str,
    student: &User,
    answers: &[SubmittedAnswer],
) -> Result<Submission, EngineError> {
    let now = primitive_now_utc();

    let submission = repositories::submissions::find_by_id(state.db(), submission_id)
        .await?
        .ok_or(EngineError::NotFound("submission"))?;

    if submission.student_id != student.id {
        return Err(EngineError::Authorization("submission belongs to another student"));
    }
    if submission.status != SubmissionStatus::InProgress {
        return Err(EngineError::policy("attempt is not in progress"));
    }

    let elapsed_seconds = (now - submission.started_at).whole_seconds();
    check_time_limit(
        elapsed_seconds,
        submission.time_limit_seconds,
        state.settings().quiz().submit_grace_seconds,
    )?;

    let quiz = repositories::quizzes::find_by_id(state.db(), &submission.quiz_id)
        .await?
        .ok_or(EngineError::NotFound("quiz"))?;
    let questions = repositories::questions::list_by_quiz(state.db(), &submission.quiz_id).await?;

    let policy = state.settings().quiz().unmatched_answer_policy;
    let graded = scoring::grade_answers(&questions, answers, policy)?;
    let score = scoring::compute_score(&graded, &questions);

    let (status, evaluated_at, auto_graded) = if quiz.auto_grade {
        (SubmissionStatus::Evaluated, Some(now), true)
    } else {
        (SubmissionStatus::Submitted, None, false)
    };

    let mut tx = state.db().begin().await?;

    let updated = repositories::submissions::finalize(
        &mut *tx,
        submission_id,
        repositories::submissions::FinalizeAttempt {
            status,
            answers: scoring::answers_to_json(&graded),
            score_total: score.total,
            score_percentage: score.percentage,
            grade: score.grade.as_str(),
            ended_at: now,
            total_time_seconds: elapsed_seconds,
            auto_graded,
            evaluated_at,
            now,
        },
    )
    .await?;

    if updated == 0 {
        return Err(EngineError::policy("attempt is not in progress"));
    }

    stats::record_quiz_attempt(&mut tx, &submission.quiz_id, score.percentage, now).await?;
    stats::record_user_attempt(&mut tx, &student.id, score.percentage, now).await?;

    tx.commit().await?;

    tracing::info!(
        submission_id,
        quiz_id = %submission.quiz_id,
        student_id = %student.id,
        percentage = score.percentage,
        grade = score.grade.as_str(),
        auto_graded,
        "attempt submitted"
    );
    metrics::counter!("attempts_submitted_total").increment(1);
    metrics::histogram!("attempt_score_percentage").record(score.percentage);

    repositories::submissions::find_by_id(state.db(), submission_id)
        .await?
        .ok_or(EngineError::NotFound("submission"))
}

#[cfg(test)]
mod tests {
    use sqlx::types::Json;
    use time::{Date, Month, Time};

    use super::*;
    use crate::db::models::QuestionOption;

    fn at(hour: u8, minute: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, Month::March, 10).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, minute, 0).unwrap())
    }

    fn quiz(status: QuizStatus) -> Quiz {
        Quiz {
            id: "quiz-1".to_string(),
            title: "Biology".to_string(),
            description: None,
            creator_id: "teacher-1".to_string(),
            status,
            is_public: true,
            time_limit_minutes: Some(30),
            allow_retake: false,
            auto_grade: true,
            passing_score: 60.0,
            opens_at: Some(at(9, 0)),
            closes_at: Some(at(17, 0)),
            stats_attempts: 0,
            stats_average_score: 0.0,
            created_at: at(8, 0),
            updated_at: at(8, 0),
            published_at: Some(at(8, 30)),
        }
    }

    #[test]
    fn open_quiz_inside_window_is_available() {
        assert!(ensure_quiz_open(&quiz(QuizStatus::Published), at(12, 0)).is_ok());
    }

    #[test]
    fn draft_quiz_is_not_available() {
        let result = ensure_quiz_open(&quiz(QuizStatus::Draft), at(12, 0));
        assert!(matches!(result, Err(EngineError::Policy(_))));
    }

    #[test]
    fn quiz_outside_window_is_not_available() {
        let published = quiz(QuizStatus::Published);
        assert!(matches!(ensure_quiz_open(&published, at(8, 0)), Err(EngineError::Policy(_))));
        assert!(matches!(ensure_quiz_open(&published, at(18, 0)), Err(EngineError::Policy(_))));
    }

    #[test]
    fn quiz_without_window_is_always_open_when_published() {
        let mut published = quiz(QuizStatus::Published);
        published.opens_at = None;
        published.closes_at = None;
        assert!(ensure_quiz_open(&published, at(3, 0)).is_ok());
    }

    #[test]
    fn within_time_limit_passes() {
        assert!(check_time_limit(1799, Some(1800), 0).is_ok());
        assert!(check_time_limit(1800, Some(1800), 0).is_ok());
    }

    #[test]
    fn over_time_limit_fails_with_elapsed_and_limit() {
        let result = check_time_limit(1801, Some(1800), 0);
        match result {
            Err(EngineError::TimeExceeded { elapsed_seconds, limit_seconds }) => {
                assert_eq!(elapsed_seconds, 1801);
                assert_eq!(limit_seconds, 1800);
            }
            other => panic!("expected TimeExceeded, got {other:?}"),
        }
    }

    #[test]
    fn grace_period_extends_the_limit() {
        assert!(check_time_limit(1805, Some(1800), 10).is_ok());
        assert!(check_time_limit(1811, Some(1800), 10).is_err());
    }

    #[test]
    fn no_limit_means_no_deadline() {
        assert!(check_time_limit(i64::MAX, None, 0).is_ok());
    }

    #[test]
    fn sanitized_question_strips_correctness() {
        let question = Question {
            id: "q1".to_string(),
            quiz_id: "quiz-1".to_string(),
            kind: QuestionKind::MultipleChoice,
            prompt: "Pick one".to_string(),
            options: Json(vec![
                QuestionOption { text: "Right".to_string(), is_correct: true },
                QuestionOption { text: "Wrong".to_string(), is_correct: false },
            ]),
            correct_answer: Some("Right".to_string()),
            points: 1.0,
            order_index: 0,
        };

        let sanitized = sanitize_question(&question);
        assert_eq!(sanitized.options, vec!["Right".to_string(), "Wrong".to_string()]);

        let json = serde_json::to_value(&sanitized).unwrap();
        assert!(json.get("correct_answer").is_none());
        assert!(json["options"].as_array().unwrap().iter().all(|o| o.is_string()));
    }
}
