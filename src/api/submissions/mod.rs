use axum::{
    routing::{get, post},
    Router,
};

use crate::core::state::AppState;

mod student;
mod teacher;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/quiz/:quiz_id/start", post(student::start_attempt))
        .route("/quiz/:quiz_id", get(teacher::list_for_quiz))
        .route("/mine", get(student::list_mine))
        .route("/:submission_id", get(student::get_submission))
        .route("/:submission_id/submit", post(student::submit_attempt))
        .route("/:submission_id/revaluation", post(student::request_revaluation))
        .route("/:submission_id/evaluate", post(teacher::evaluate))
        .route("/:submission_id/revaluation/handle", post(teacher::handle_revaluation))
}
