use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::pagination::Pagination;
use crate::core::state::AppState;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::submission::{
    AttemptStartResponse, RevaluationRequestBody, SubmissionResponse, SubmitAttemptRequest,
};
use crate::services::{attempts, evaluation};

pub(super) async fn start_attempt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<String>,
) -> Result<(StatusCode, Json<AttemptStartResponse>), ApiError> {
    let start = attempts::start_attempt(&state, &quiz_id, &user).await?;
    Ok((StatusCode::CREATED, Json(AttemptStartResponse::from_service(start))))
}

pub(super) async fn submit_attempt(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(submission_id): Path<String>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission =
        attempts::submit_attempt(&state, &submission_id, &user, &payload.answers).await?;
    Ok(Json(SubmissionResponse::from_db(submission)))
}

pub(super) async fn list_mine(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    let submissions = repositories::submissions::list_by_student(
        state.db(),
        &user.id,
        pagination.skip,
        pagination.limit,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::from_db).collect()))
}

pub(super) async fn get_submission(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(submission_id): Path<String>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = repositories::submissions::find_by_id(state.db(), &submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    if submission.student_id != user.id && user.role == UserRole::Student {
        return Err(ApiError::Forbidden("Submission belongs to another student"));
    }

    Ok(Json(SubmissionResponse::from_db(submission)))
}

pub(super) async fn request_revaluation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(submission_id): Path<String>,
    Json(payload): Json<RevaluationRequestBody>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let submission =
        evaluation::request_revaluation(&state, &submission_id, &user, &payload.reason).await?;
    Ok(Json(SubmissionResponse::from_db(submission)))
}
