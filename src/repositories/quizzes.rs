use sqlx::PgPool;

use crate::db::models::Quiz;
use crate::db::types::QuizStatus;

const COLUMNS: &str = "\
    id, title, description, creator_id, status, is_public, time_limit_minutes, \
    allow_retake, auto_grade, passing_score, opens_at, closes_at, \
    stats_attempts, stats_average_score, created_at, updated_at, published_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) struct CreateQuiz<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) creator_id: &'a str,
    pub(crate) status: QuizStatus,
    pub(crate) is_public: bool,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) allow_retake: bool,
    pub(crate) auto_grade: bool,
    pub(crate) passing_score: f64,
    pub(crate) opens_at: Option<time::PrimitiveDateTime>,
    pub(crate) closes_at: Option<time::PrimitiveDateTime>,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuiz<'_>,
) -> Result<Quiz, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quizzes (
            id, title, description, creator_id, status, is_public, time_limit_minutes,
            allow_retake, auto_grade, passing_score, opens_at, closes_at,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.creator_id)
    .bind(params.status)
    .bind(params.is_public)
    .bind(params.time_limit_minutes)
    .bind(params.allow_retake)
    .bind(params.auto_grade)
    .bind(params.passing_score)
    .bind(params.opens_at)
    .bind(params.closes_at)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn publish(
    pool: &PgPool,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quizzes SET status = $1, published_at = $2, updated_at = $2 WHERE id = $3",
    )
    .bind(QuizStatus::Published)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_creator(
    pool: &PgPool,
    creator_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {COLUMNS} FROM quizzes
         WHERE creator_id = $1
         ORDER BY created_at DESC OFFSET $2 LIMIT $3"
    ))
    .bind(creator_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn assign_student(
    pool: &PgPool,
    quiz_id: &str,
    student_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO quiz_assignments (quiz_id, student_id, assigned_at)
         VALUES ($1, $2, $3)
         ON CONFLICT DO NOTHING",
    )
    .bind(quiz_id)
    .bind(student_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn is_student_assigned(
    pool: &PgPool,
    quiz_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM quiz_assignments WHERE quiz_id = $1 AND student_id = $2",
    )
    .bind(quiz_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

pub(crate) async fn stats_for_update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<(i64, f64), sqlx::Error> {
    sqlx::query_as::<_, (i64, f64)>(
        "SELECT stats_attempts, stats_average_score FROM quizzes WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn update_stats(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    attempts: i64,
    average_score: f64,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quizzes
         SET stats_attempts = $1, stats_average_score = $2, updated_at = $3
         WHERE id = $4",
    )
    .bind(attempts)
    .bind(average_score)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}
