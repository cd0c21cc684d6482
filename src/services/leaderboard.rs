//! Competitions and their ranked leaderboards. Entries are best-result-only
//! per participant; ranks are recomputed after every change under a
//! per-competition lock.

use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Competition, CompetitionParticipant, LeaderboardEntry, User};
use crate::db::types::{CompetitionStatus, SubmissionStatus};
use crate::repositories;
use crate::services::errors::EngineError;

fn cache_key(competition_id: &str, limit: i64) -> String {
    format!("leaderboard:{competition_id}:{limit}")
}

pub(crate) fn ensure_competition_open(
    competition: &Competition,
    now: PrimitiveDateTime,
) -> Result<(), EngineError> {
    if competition.status != CompetitionStatus::Active {
        return Err(EngineError::policy("competition is not active"));
    }
    if now < competition.starts_at || now > competition.ends_at {
        return Err(EngineError::policy("competition is outside its window"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryDecision {
    Insert,
    Replace,
    Keep,
}

/// Best-result-only: an existing entry is replaced only by a strictly
/// greater percentage, never by a tie or a worse result.
pub(crate) fn entry_decision(
    existing: Option<&LeaderboardEntry>,
    new_percentage: f64,
) -> EntryDecision {
    match existing {
        None => EntryDecision::Insert,
        Some(entry) if new_percentage > entry.percentage => EntryDecision::Replace,
        Some(_) => EntryDecision::Keep,
    }
}

/// Dense ranking over entries already ordered by (score desc, completion
/// time asc). Equal results share a rank; no integers are skipped.
pub(crate) fn assign_dense_ranks(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.completion_time_seconds.cmp(&b.completion_time_seconds))
    });

    let mut rank = 0;
    let mut previous: Option<(f64, i64)> = None;
    for entry in entries.iter_mut() {
        let key = (entry.score, entry.completion_time_seconds);
        if previous != Some(key) {
            rank += 1;
            previous = Some(key);
        }
        entry.rank = rank;
    }
}

pub(crate) async fn create_competition(
    state: &AppState,
    quiz_id: &str,
    title: &str,
    starts_at: PrimitiveDateTime,
    ends_at: PrimitiveDateTime,
    creator: &User,
) -> Result<Competition, EngineError> {
    if ends_at <= starts_at {
        return Err(EngineError::validation("competition must end after it starts"));
    }

    let quiz = repositories::quizzes::find_by_id(state.db(), quiz_id)
        .await?
        .ok_or(EngineError::NotFound("quiz"))?;

    let now = primitive_now_utc();
    let competition = repositories::competitions::create(
        state.db(),
        repositories::competitions::CreateCompetition {
            id: &Uuid::new_v4().to_string(),
            quiz_id: &quiz.id,
            title,
            status: CompetitionStatus::Active,
            starts_at,
            ends_at,
            created_by: &creator.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    tracing::info!(competition_id = %competition.id, quiz_id, "competition created");
    Ok(competition)
}

/// Registration is idempotent: a second call returns the existing record.
pub(crate) async fn register(
    state: &AppState,
    competition_id: &str,
    user: &User,
) -> Result<CompetitionParticipant, EngineError> {
    let now = primitive_now_utc();

    let competition = repositories::competitions::find_by_id(state.db(), competition_id)
        .await?
        .ok_or(EngineError::NotFound("competition"))?;
    if competition.status == CompetitionStatus::Completed || now > competition.ends_at {
        return Err(EngineError::policy("competition registration is closed"));
    }

    repositories::competitions::register_participant(state.db(), competition_id, &user.id, now)
        .await?;

    repositories::competitions::find_participant(state.db(), competition_id, &user.id)
        .await?
        .ok_or(EngineError::NotFound("participant"))
}

pub(crate) async fn record_entry(
    state: &AppState,
    competition_id: &str,
    student: &User,
    submission_id: &str,
) -> Result<LeaderboardEntry, EngineError> {
    let now = primitive_now_utc();

    let competition = repositories::competitions::find_by_id(state.db(), competition_id)
        .await?
        .ok_or(EngineError::NotFound("competition"))?;
    ensure_competition_open(&competition, now)?;

    let submission = repositories::submissions::find_by_id(state.db(), submission_id)
        .await?
        .ok_or(EngineError::NotFound("submission"))?;
    if submission.student_id != student.id {
        return Err(EngineError::Authorization("submission belongs to another student"));
    }
    if submission.quiz_id != competition.quiz_id {
        return Err(EngineError::validation("submission is for a different quiz"));
    }
    if submission.status != SubmissionStatus::Evaluated {
        return Err(EngineError::policy("attempt has not been evaluated"));
    }

    let completion_time_seconds = submission.total_time_seconds.unwrap_or_default();

    let mut tx = state.db().begin().await?;
    repositories::competitions::acquire_competition_lock(&mut *tx, competition_id).await?;

    if repositories::competitions::find_participant(&mut *tx, competition_id, &student.id)
        .await?
        .is_none()
    {
        return Err(EngineError::policy("student is not registered for this competition"));
    }

    let existing =
        repositories::leaderboard::find_by_user(&mut *tx, competition_id, &student.id).await?;

    match (entry_decision(existing.as_ref(), submission.score_percentage), &existing) {
        (EntryDecision::Insert, _) => {
            repositories::leaderboard::insert(
                &mut *tx,
                repositories::leaderboard::CreateEntry {
                    id: &Uuid::new_v4().to_string(),
                    competition_id,
                    user_id: &student.id,
                    submission_id,
                    score: submission.score_total,
                    percentage: submission.score_percentage,
                    completion_time_seconds,
                    now,
                },
            )
            .await?;
        }
        (EntryDecision::Replace, Some(entry)) => {
            repositories::leaderboard::replace_result(
                &mut *tx,
                &entry.id,
                submission_id,
                submission.score_total,
                submission.score_percentage,
                completion_time_seconds,
                now,
            )
            .await?;
        }
        _ => {}
    }

    repositories::competitions::mark_participated(&mut *tx, competition_id, &student.id).await?;
    recompute_ranking_locked(&mut tx, competition_id, now).await?;

    tx.commit().await?;

    invalidate_cache(state, competition_id).await;
    metrics::counter!("leaderboard_entries_recorded_total").increment(1);

    repositories::leaderboard::find_by_user(state.db(), competition_id, &student.id)
        .await?
        .ok_or(EngineError::NotFound("leaderboard entry"))
}

/// Rewrites only ranks that changed, so a recompute of an unchanged
/// leaderboard writes nothing.
async fn recompute_ranking_locked(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    competition_id: &str,
    now: PrimitiveDateTime,
) -> Result<(), EngineError> {
    let mut entries =
        repositories::leaderboard::list_for_ranking(&mut **tx, competition_id).await?;
    let stored: Vec<(String, i32)> =
        entries.iter().map(|entry| (entry.id.clone(), entry.rank)).collect();

    assign_dense_ranks(&mut entries);

    for entry in &entries {
        let unchanged = stored
            .iter()
            .any(|(id, rank)| *id == entry.id && *rank == entry.rank);
        if !unchanged {
            repositories::leaderboard::update_rank(&mut **tx, &entry.id, entry.rank, now).await?;
        }
    }

    Ok(())
}

pub(crate) async fn recompute_ranking(
    state: &AppState,
    competition_id: &str,
) -> Result<(), EngineError> {
    let now = primitive_now_utc();

    let mut tx = state.db().begin().await?;
    repositories::competitions::acquire_competition_lock(&mut *tx, competition_id).await?;
    recompute_ranking_locked(&mut tx, competition_id, now).await?;
    tx.commit().await?;

    invalidate_cache(state, competition_id).await;
    Ok(())
}

pub(crate) async fn get_leaderboard(
    state: &AppState,
    competition_id: &str,
    limit: i64,
) -> Result<Vec<LeaderboardEntry>, EngineError> {
    if repositories::competitions::find_by_id(state.db(), competition_id).await?.is_none() {
        return Err(EngineError::NotFound("competition"));
    }

    let key = cache_key(competition_id, limit);
    if let Some(cached) = state.redis().cache_get(&key).await {
        if let Ok(entries) = serde_json::from_str::<Vec<LeaderboardEntry>>(&cached) {
            metrics::counter!("leaderboard_cache_hits_total").increment(1);
            return Ok(entries);
        }
    }

    let entries =
        repositories::leaderboard::list_ordered_by_rank(state.db(), competition_id, limit).await?;

    if let Ok(serialized) = serde_json::to_string(&entries) {
        let ttl = state.settings().quiz().leaderboard_cache_ttl_seconds;
        state.redis().cache_set(&key, &serialized, ttl).await;
    }

    Ok(entries)
}

async fn invalidate_cache(state: &AppState, competition_id: &str) {
    // Common page sizes; anything else simply expires with the TTL.
    for limit in [10, 25, 50, 100] {
        state.redis().cache_invalidate(&cache_key(competition_id, limit)).await;
    }
}

#[cfg(test)]
mod tests {
    use time::{Date, Month, Time};

    use super::*;

    fn at(hour: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, Month::April, 5).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, 0, 0).unwrap())
    }

    fn entry(user: &str, score: f64, completion_time_seconds: i64) -> LeaderboardEntry {
        LeaderboardEntry {
            id: format!("entry-{user}"),
            competition_id: "comp-1".to_string(),
            user_id: user.to_string(),
            submission_id: format!("sub-{user}"),
            score,
            percentage: score,
            completion_time_seconds,
            rank: 0,
            updated_at: at(12),
        }
    }

    fn competition(status: CompetitionStatus) -> Competition {
        Competition {
            id: "comp-1".to_string(),
            quiz_id: "quiz-1".to_string(),
            title: "Spring Cup".to_string(),
            status,
            starts_at: at(9),
            ends_at: at(18),
            created_by: "teacher-1".to_string(),
            created_at: at(8),
            updated_at: at(8),
        }
    }

    #[test]
    fn faster_completion_wins_score_ties() {
        let mut entries = vec![entry("alice", 80.0, 120), entry("bob", 80.0, 90)];
        assign_dense_ranks(&mut entries);

        assert_eq!(entries[0].user_id, "bob");
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[1].user_id, "alice");
        assert_eq!(entries[1].rank, 2);
    }

    #[test]
    fn higher_score_ranks_first() {
        let mut entries =
            vec![entry("alice", 60.0, 10), entry("bob", 90.0, 500), entry("carol", 75.0, 5)];
        assign_dense_ranks(&mut entries);

        let order: Vec<&str> = entries.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(order, vec!["bob", "carol", "alice"]);
        assert_eq!(entries.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn identical_results_share_a_dense_rank() {
        let mut entries =
            vec![entry("alice", 80.0, 90), entry("bob", 80.0, 90), entry("carol", 70.0, 60)];
        assign_dense_ranks(&mut entries);

        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[1].rank, 1);
        // Dense: no skipped integers after the tie.
        assert_eq!(entries[2].rank, 2);
    }

    #[test]
    fn ranking_is_idempotent() {
        let mut entries = vec![entry("alice", 80.0, 120), entry("bob", 80.0, 90)];
        assign_dense_ranks(&mut entries);
        let first: Vec<(String, i32)> =
            entries.iter().map(|e| (e.user_id.clone(), e.rank)).collect();

        assign_dense_ranks(&mut entries);
        let second: Vec<(String, i32)> =
            entries.iter().map(|e| (e.user_id.clone(), e.rank)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_leaderboard_ranks_nothing() {
        let mut entries: Vec<LeaderboardEntry> = Vec::new();
        assign_dense_ranks(&mut entries);
        assert!(entries.is_empty());
    }

    #[test]
    fn first_result_is_inserted() {
        assert_eq!(entry_decision(None, 0.0), EntryDecision::Insert);
    }

    #[test]
    fn strictly_better_percentage_replaces() {
        let existing = entry("alice", 80.0, 120);
        assert_eq!(entry_decision(Some(&existing), 80.5), EntryDecision::Replace);
    }

    #[test]
    fn equal_or_worse_percentage_keeps_stored_entry() {
        let existing = entry("alice", 80.0, 120);
        assert_eq!(entry_decision(Some(&existing), 80.0), EntryDecision::Keep);
        assert_eq!(entry_decision(Some(&existing), 45.0), EntryDecision::Keep);
    }

    #[test]
    fn active_competition_inside_window_is_open() {
        assert!(ensure_competition_open(&competition(CompetitionStatus::Active), at(12)).is_ok());
    }

    #[test]
    fn inactive_or_out_of_window_competition_is_closed() {
        let draft = competition(CompetitionStatus::Draft);
        assert!(matches!(ensure_competition_open(&draft, at(12)), Err(EngineError::Policy(_))));

        let active = competition(CompetitionStatus::Active);
        assert!(matches!(ensure_competition_open(&active, at(8)), Err(EngineError::Policy(_))));
        assert!(matches!(ensure_competition_open(&active, at(19)), Err(EngineError::Policy(_))));
    }
}
