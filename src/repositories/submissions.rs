use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Submission;
use crate::db::types::{RevaluationStatus, SubmissionStatus};

const COLUMNS: &str = "\
    id, quiz_id, student_id, status, answers, score_total, score_percentage, grade, \
    started_at, ended_at, total_time_seconds, time_limit_seconds, auto_graded, \
    evaluated_by, evaluated_at, feedback, ai_insights, \
    revaluation_requested, revaluation_status, revaluation_requested_at, revaluation_reason, \
    revaluation_handled_by, revaluation_handled_at, revaluation_response, \
    created_at, updated_at";

/// Serializes start-attempt races for one (quiz, student) pair within the
/// surrounding transaction.
pub(crate) async fn acquire_attempt_lock(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    student_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("attempt:{quiz_id}:{student_id}"))
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("SELECT {COLUMNS} FROM submissions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_in_progress(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    student_id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions
         WHERE quiz_id = $1 AND student_id = $2 AND status = $3"
    ))
    .bind(quiz_id)
    .bind(student_id)
    .bind(SubmissionStatus::InProgress)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn has_finalized(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM submissions
         WHERE quiz_id = $1 AND student_id = $2 AND status IN ($3, $4)
         LIMIT 1",
    )
    .bind(quiz_id)
    .bind(student_id)
    .bind(SubmissionStatus::Submitted)
    .bind(SubmissionStatus::Evaluated)
    .fetch_optional(executor)
    .await?;
    Ok(found.is_some())
}

pub(crate) struct CreateSubmission<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) time_limit_seconds: Option<i64>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Returns false when the partial unique index rejected a second
/// in-progress attempt for the same (quiz, student).
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateSubmission<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO submissions (
            id, quiz_id, student_id, status, started_at, time_limit_seconds,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        ON CONFLICT DO NOTHING",
    )
    .bind(params.id)
    .bind(params.quiz_id)
    .bind(params.student_id)
    .bind(SubmissionStatus::InProgress)
    .bind(params.started_at)
    .bind(params.time_limit_seconds)
    .bind(params.created_at)
    .bind(params.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) struct FinalizeAttempt<'a> {
    pub(crate) status: SubmissionStatus,
    pub(crate) answers: serde_json::Value,
    pub(crate) score_total: f64,
    pub(crate) score_percentage: f64,
    pub(crate) grade: &'a str,
    pub(crate) ended_at: PrimitiveDateTime,
    pub(crate) total_time_seconds: i64,
    pub(crate) auto_graded: bool,
    pub(crate) evaluated_at: Option<PrimitiveDateTime>,
    pub(crate) now: PrimitiveDateTime,
}

/// Guarded on the in-progress status so a concurrent submit of the same
/// attempt grades it exactly once.
pub(crate) async fn finalize(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: FinalizeAttempt<'_>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET status = $1, answers = $2, score_total = $3, score_percentage = $4,
             grade = $5, ended_at = $6, total_time_seconds = $7, auto_graded = $8,
             evaluated_at = $9, updated_at = $10
         WHERE id = $11 AND status = $12",
    )
    .bind(params.status)
    .bind(params.answers)
    .bind(params.score_total)
    .bind(params.score_percentage)
    .bind(params.grade)
    .bind(params.ended_at)
    .bind(params.total_time_seconds)
    .bind(params.auto_graded)
    .bind(params.evaluated_at)
    .bind(params.now)
    .bind(id)
    .bind(SubmissionStatus::InProgress)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) struct EvaluationUpdate<'a> {
    pub(crate) answers: serde_json::Value,
    pub(crate) score_total: f64,
    pub(crate) score_percentage: f64,
    pub(crate) grade: &'a str,
    pub(crate) evaluated_by: &'a str,
    pub(crate) feedback: Option<&'a str>,
    pub(crate) ai_insights: Option<serde_json::Value>,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn apply_evaluation(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: EvaluationUpdate<'_>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET status = $1, answers = $2, score_total = $3, score_percentage = $4,
             grade = $5, auto_graded = FALSE, evaluated_by = $6, evaluated_at = $7,
             feedback = $8, ai_insights = COALESCE($9, ai_insights), updated_at = $7
         WHERE id = $10 AND status IN ($11, $12)",
    )
    .bind(SubmissionStatus::Evaluated)
    .bind(params.answers)
    .bind(params.score_total)
    .bind(params.score_percentage)
    .bind(params.grade)
    .bind(params.evaluated_by)
    .bind(params.now)
    .bind(params.feedback)
    .bind(params.ai_insights)
    .bind(id)
    .bind(SubmissionStatus::Submitted)
    .bind(SubmissionStatus::Evaluated)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Conditional on (evaluated, not yet requested) so duplicate appeals
/// fail atomically.
pub(crate) async fn request_revaluation(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    reason: &str,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET revaluation_requested = TRUE, revaluation_status = $1,
             revaluation_requested_at = $2, revaluation_reason = $3, updated_at = $2
         WHERE id = $4 AND status = $5 AND revaluation_requested = FALSE",
    )
    .bind(RevaluationStatus::Pending)
    .bind(now)
    .bind(reason)
    .bind(id)
    .bind(SubmissionStatus::Evaluated)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) struct HandleRevaluation<'a> {
    pub(crate) decision: RevaluationStatus,
    pub(crate) handled_by: &'a str,
    pub(crate) response: Option<&'a str>,
    pub(crate) answers: Option<serde_json::Value>,
    pub(crate) score_total: Option<f64>,
    pub(crate) score_percentage: Option<f64>,
    pub(crate) grade: Option<&'a str>,
    pub(crate) now: PrimitiveDateTime,
}

/// Conditional on the pending sub-state; terminal decisions never move.
pub(crate) async fn handle_revaluation(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: HandleRevaluation<'_>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE submissions
         SET revaluation_status = $1, revaluation_handled_by = $2,
             revaluation_handled_at = $3, revaluation_response = $4,
             answers = COALESCE($5, answers),
             score_total = COALESCE($6, score_total),
             score_percentage = COALESCE($7, score_percentage),
             grade = COALESCE($8, grade),
             updated_at = $3
         WHERE id = $9 AND revaluation_status = $10",
    )
    .bind(params.decision)
    .bind(params.handled_by)
    .bind(params.now)
    .bind(params.response)
    .bind(params.answers)
    .bind(params.score_total)
    .bind(params.score_percentage)
    .bind(params.grade)
    .bind(id)
    .bind(RevaluationStatus::Pending)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn list_by_student(
    pool: &PgPool,
    student_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions
         WHERE student_id = $1
         ORDER BY created_at DESC OFFSET $2 LIMIT $3"
    ))
    .bind(student_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_quiz(
    pool: &PgPool,
    quiz_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions
         WHERE quiz_id = $1
         ORDER BY created_at DESC OFFSET $2 LIMIT $3"
    ))
    .bind(quiz_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}
