use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Competition, CompetitionParticipant};
use crate::db::types::{CompetitionStatus, ParticipantStatus};

const COLUMNS: &str =
    "id, quiz_id, title, status, starts_at, ends_at, created_by, created_at, updated_at";

/// Serializes leaderboard read-modify-write for one competition within the
/// surrounding transaction.
pub(crate) async fn acquire_competition_lock(
    executor: impl sqlx::PgExecutor<'_>,
    competition_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("competition:{competition_id}"))
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<Competition>, sqlx::Error> {
    sqlx::query_as::<_, Competition>(&format!(
        "SELECT {COLUMNS} FROM competitions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct CreateCompetition<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) status: CompetitionStatus,
    pub(crate) starts_at: PrimitiveDateTime,
    pub(crate) ends_at: PrimitiveDateTime,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateCompetition<'_>,
) -> Result<Competition, sqlx::Error> {
    sqlx::query_as::<_, Competition>(&format!(
        "INSERT INTO competitions (
            id, quiz_id, title, status, starts_at, ends_at, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.quiz_id)
    .bind(params.title)
    .bind(params.status)
    .bind(params.starts_at)
    .bind(params.ends_at)
    .bind(params.created_by)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn register_participant(
    pool: &PgPool,
    competition_id: &str,
    user_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO competition_participants (competition_id, user_id, status, registered_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT DO NOTHING",
    )
    .bind(competition_id)
    .bind(user_id)
    .bind(ParticipantStatus::Registered)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn find_participant(
    executor: impl sqlx::PgExecutor<'_>,
    competition_id: &str,
    user_id: &str,
) -> Result<Option<CompetitionParticipant>, sqlx::Error> {
    sqlx::query_as::<_, CompetitionParticipant>(
        "SELECT competition_id, user_id, status, registered_at
         FROM competition_participants
         WHERE competition_id = $1 AND user_id = $2",
    )
    .bind(competition_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn mark_participated(
    executor: impl sqlx::PgExecutor<'_>,
    competition_id: &str,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE competition_participants SET status = $1
         WHERE competition_id = $2 AND user_id = $3",
    )
    .bind(ParticipantStatus::Participated)
    .bind(competition_id)
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(())
}
