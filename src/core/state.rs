use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::ai_review::AiReviewService;

/// Shared handles threaded through every handler. Cheap to clone; the
/// AI service is absent when no API key is configured.
#[derive(Clone)]
pub(crate) struct AppState {
    settings: Arc<Settings>,
    db: PgPool,
    redis: RedisHandle,
    ai: Option<Arc<AiReviewService>>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        ai: Option<AiReviewService>,
    ) -> Self {
        Self { settings: Arc::new(settings), db, redis, ai: ai.map(Arc::new) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.redis
    }

    pub(crate) fn ai(&self) -> Option<&AiReviewService> {
        self.ai.as_deref()
    }
}
