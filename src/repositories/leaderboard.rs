use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::LeaderboardEntry;

const COLUMNS: &str = "\
    id, competition_id, user_id, submission_id, score, percentage, \
    completion_time_seconds, rank, updated_at";

pub(crate) async fn find_by_user(
    executor: impl sqlx::PgExecutor<'_>,
    competition_id: &str,
    user_id: &str,
) -> Result<Option<LeaderboardEntry>, sqlx::Error> {
    sqlx::query_as::<_, LeaderboardEntry>(&format!(
        "SELECT {COLUMNS} FROM leaderboard_entries
         WHERE competition_id = $1 AND user_id = $2"
    ))
    .bind(competition_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub(crate) struct CreateEntry<'a> {
    pub(crate) id: &'a str,
    pub(crate) competition_id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) submission_id: &'a str,
    pub(crate) score: f64,
    pub(crate) percentage: f64,
    pub(crate) completion_time_seconds: i64,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateEntry<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO leaderboard_entries (
            id, competition_id, user_id, submission_id, score, percentage,
            completion_time_seconds, rank, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,0,$8)",
    )
    .bind(params.id)
    .bind(params.competition_id)
    .bind(params.user_id)
    .bind(params.submission_id)
    .bind(params.score)
    .bind(params.percentage)
    .bind(params.completion_time_seconds)
    .bind(params.now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn replace_result(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    submission_id: &str,
    score: f64,
    percentage: f64,
    completion_time_seconds: i64,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE leaderboard_entries
         SET submission_id = $1, score = $2, percentage = $3,
             completion_time_seconds = $4, updated_at = $5
         WHERE id = $6",
    )
    .bind(submission_id)
    .bind(score)
    .bind(percentage)
    .bind(completion_time_seconds)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Entries in ranking order; rank columns may be stale until rewritten.
pub(crate) async fn list_for_ranking(
    executor: impl sqlx::PgExecutor<'_>,
    competition_id: &str,
) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
    sqlx::query_as::<_, LeaderboardEntry>(&format!(
        "SELECT {COLUMNS} FROM leaderboard_entries
         WHERE competition_id = $1
         ORDER BY score DESC, completion_time_seconds ASC"
    ))
    .bind(competition_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn update_rank(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    rank: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE leaderboard_entries SET rank = $1, updated_at = $2 WHERE id = $3")
        .bind(rank)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn list_ordered_by_rank(
    pool: &PgPool,
    competition_id: &str,
    limit: i64,
) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
    sqlx::query_as::<_, LeaderboardEntry>(&format!(
        "SELECT {COLUMNS} FROM leaderboard_entries
         WHERE competition_id = $1
         ORDER BY rank ASC
         LIMIT $2"
    ))
    .bind(competition_id)
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}
