use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Competition, CompetitionParticipant, LeaderboardEntry};
use crate::db::types::{CompetitionStatus, ParticipantStatus};
use crate::schemas::deserialize_datetime;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CompetitionCreate {
    #[serde(alias = "quizId")]
    pub(crate) quiz_id: String,
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(alias = "startsAt", deserialize_with = "deserialize_datetime")]
    pub(crate) starts_at: PrimitiveDateTime,
    #[serde(alias = "endsAt", deserialize_with = "deserialize_datetime")]
    pub(crate) ends_at: PrimitiveDateTime,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordEntryRequest {
    #[serde(alias = "submissionId")]
    pub(crate) submission_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeaderboardQuery {
    #[serde(default = "default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct CompetitionResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) title: String,
    pub(crate) status: CompetitionStatus,
    pub(crate) starts_at: String,
    pub(crate) ends_at: String,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
}

impl CompetitionResponse {
    pub(crate) fn from_db(competition: Competition) -> Self {
        Self {
            id: competition.id,
            quiz_id: competition.quiz_id,
            title: competition.title,
            status: competition.status,
            starts_at: format_primitive(competition.starts_at),
            ends_at: format_primitive(competition.ends_at),
            created_by: competition.created_by,
            created_at: format_primitive(competition.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ParticipantResponse {
    pub(crate) competition_id: String,
    pub(crate) user_id: String,
    pub(crate) status: ParticipantStatus,
    pub(crate) registered_at: String,
}

impl ParticipantResponse {
    pub(crate) fn from_db(participant: CompetitionParticipant) -> Self {
        Self {
            competition_id: participant.competition_id,
            user_id: participant.user_id,
            status: participant.status,
            registered_at: format_primitive(participant.registered_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LeaderboardEntryResponse {
    pub(crate) user_id: String,
    pub(crate) submission_id: String,
    pub(crate) score: f64,
    pub(crate) percentage: f64,
    pub(crate) completion_time_seconds: i64,
    pub(crate) rank: i32,
}

impl LeaderboardEntryResponse {
    pub(crate) fn from_db(entry: LeaderboardEntry) -> Self {
        Self {
            user_id: entry.user_id,
            submission_id: entry.submission_id,
            score: entry.score,
            percentage: entry.percentage,
            completion_time_seconds: entry.completion_time_seconds,
            rank: entry.rank,
        }
    }
}

fn default_limit() -> i64 {
    100
}
