use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentStaff, CurrentUser};
use crate::core::state::AppState;
use crate::schemas::competition::{
    CompetitionCreate, CompetitionResponse, LeaderboardEntryResponse, LeaderboardQuery,
    ParticipantResponse, RecordEntryRequest,
};
use crate::services::leaderboard;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_competition))
        .route("/:competition_id/register", post(register))
        .route("/:competition_id/entries", post(record_entry))
        .route("/:competition_id/leaderboard", get(get_leaderboard))
        .route("/:competition_id/recompute", post(recompute))
}

async fn create_competition(
    State(state): State<AppState>,
    CurrentStaff(user): CurrentStaff,
    Json(payload): Json<CompetitionCreate>,
) -> Result<(StatusCode, Json<CompetitionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let competition = leaderboard::create_competition(
        &state,
        &payload.quiz_id,
        &payload.title,
        payload.starts_at,
        payload.ends_at,
        &user,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(CompetitionResponse::from_db(competition))))
}

async fn register(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(competition_id): Path<String>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let participant = leaderboard::register(&state, &competition_id, &user).await?;
    Ok(Json(ParticipantResponse::from_db(participant)))
}

async fn record_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(competition_id): Path<String>,
    Json(payload): Json<RecordEntryRequest>,
) -> Result<Json<LeaderboardEntryResponse>, ApiError> {
    let entry =
        leaderboard::record_entry(&state, &competition_id, &user, &payload.submission_id).await?;
    Ok(Json(LeaderboardEntryResponse::from_db(entry)))
}

async fn get_leaderboard(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(competition_id): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntryResponse>>, ApiError> {
    let entries = leaderboard::get_leaderboard(&state, &competition_id, query.limit).await?;
    Ok(Json(entries.into_iter().map(LeaderboardEntryResponse::from_db).collect()))
}

/// Repair hatch for operators; ranking is normally maintained on write.
async fn recompute(
    State(state): State<AppState>,
    CurrentAdmin(_user): CurrentAdmin,
    Path(competition_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    leaderboard::recompute_ranking(&state, &competition_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
