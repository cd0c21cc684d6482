use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::errors::EngineError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(&'static str),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            EngineError::Authorization(message) => Self::Forbidden(message),
            EngineError::Conflict { existing_submission_id } => Self::Conflict(format!(
                "an in-progress attempt already exists: {existing_submission_id}"
            )),
            EngineError::Policy(message) => Self::Conflict(message),
            EngineError::TimeExceeded { elapsed_seconds, limit_seconds } => {
                Self::BadRequest(format!(
                    "time limit exceeded: {elapsed_seconds}s elapsed, limit {limit_seconds}s"
                ))
            }
            EngineError::Validation(message) => Self::BadRequest(message),
            EngineError::ExternalService(message) => Self::ServiceUnavailable(message),
            EngineError::Database(err) => Self::internal(err, "Database operation failed"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let status = StatusCode::UNAUTHORIZED;
                let mut response = (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden(message) => {
                let status = StatusCode::FORBIDDEN;
                (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response()
            }
            ApiError::BadRequest(message) => {
                let status = StatusCode::BAD_REQUEST;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::NotFound(message) => {
                let status = StatusCode::NOT_FOUND;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::Conflict(message) => {
                let status = StatusCode::CONFLICT;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::TooManyRequests(message) => {
                let status = StatusCode::TOO_MANY_REQUESTS;
                (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response()
            }
            ApiError::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
                let status = StatusCode::SERVICE_UNAVAILABLE;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::ApiError;
    use crate::services::errors::EngineError;

    fn status_of(err: EngineError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn engine_errors_map_to_expected_statuses() {
        assert_eq!(status_of(EngineError::NotFound("quiz")), StatusCode::NOT_FOUND);
        assert_eq!(status_of(EngineError::Authorization("no")), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(EngineError::Conflict { existing_submission_id: "s1".to_string() }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(EngineError::policy("closed")), StatusCode::CONFLICT);
        assert_eq!(
            status_of(EngineError::TimeExceeded { elapsed_seconds: 10, limit_seconds: 5 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(EngineError::validation("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(EngineError::ExternalService("down".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
