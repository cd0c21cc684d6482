use thiserror::Error;

/// Typed failures of the attempt and evaluation engine. Every variant is
/// raised before any state is written, so a failed operation never leaves
/// a partial mutation behind.
#[derive(Debug, Error)]
pub(crate) enum EngineError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Authorization(&'static str),

    /// An in-progress attempt already exists for this (quiz, student).
    #[error("an in-progress attempt already exists")]
    Conflict { existing_submission_id: String },

    #[error("{0}")]
    Policy(String),

    #[error("time limit exceeded: {elapsed_seconds}s elapsed, limit {limit_seconds}s")]
    TimeExceeded { elapsed_seconds: i64, limit_seconds: i64 },

    #[error("{0}")]
    Validation(String),

    #[error("AI collaborator failed: {0}")]
    ExternalService(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    pub(crate) fn policy(message: impl Into<String>) -> Self {
        Self::Policy(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
