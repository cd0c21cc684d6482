use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStaff;
use crate::api::pagination::Pagination;
use crate::core::state::AppState;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::submission::{EvaluateRequest, HandleRevaluationRequest, SubmissionResponse};
use crate::services::evaluation;

pub(super) async fn evaluate(
    State(state): State<AppState>,
    CurrentStaff(user): CurrentStaff,
    Path(submission_id): Path<String>,
    Json(payload): Json<EvaluateRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = evaluation::evaluate_manually(
        &state,
        &submission_id,
        &user,
        payload.feedback.as_deref(),
        &payload.grades,
    )
    .await?;

    Ok(Json(SubmissionResponse::from_db(submission)))
}

pub(super) async fn handle_revaluation(
    State(state): State<AppState>,
    CurrentStaff(user): CurrentStaff,
    Path(submission_id): Path<String>,
    Json(payload): Json<HandleRevaluationRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = evaluation::handle_revaluation(
        &state,
        &submission_id,
        &user,
        payload.decision,
        payload.response.as_deref(),
        payload.new_grades.as_deref(),
    )
    .await?;

    Ok(Json(SubmissionResponse::from_db(submission)))
}

pub(super) async fn list_for_quiz(
    State(state): State<AppState>,
    CurrentStaff(user): CurrentStaff,
    Path(quiz_id): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    let quiz = repositories::quizzes::find_by_id(state.db(), &quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz"))?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;

    if user.role != UserRole::Admin && quiz.creator_id != user.id {
        return Err(ApiError::Forbidden("Only the quiz owner may list its submissions"));
    }

    let submissions = repositories::submissions::list_by_quiz(
        state.db(),
        &quiz_id,
        pagination.skip,
        pagination.limit,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::from_db).collect()))
}
