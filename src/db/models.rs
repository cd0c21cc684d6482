use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    CompetitionStatus, ParticipantStatus, QuestionKind, QuizStatus, RevaluationStatus,
    SubmissionStatus, UserRole,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) stats_quizzes_taken: i64,
    pub(crate) stats_average_score: f64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Quiz {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) creator_id: String,
    pub(crate) status: QuizStatus,
    pub(crate) is_public: bool,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) allow_retake: bool,
    pub(crate) auto_grade: bool,
    pub(crate) passing_score: f64,
    pub(crate) opens_at: Option<PrimitiveDateTime>,
    pub(crate) closes_at: Option<PrimitiveDateTime>,
    pub(crate) stats_attempts: i64,
    pub(crate) stats_average_score: f64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    pub(crate) published_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QuestionOption {
    pub(crate) text: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) options: Json<Vec<QuestionOption>>,
    pub(crate) correct_answer: Option<String>,
    pub(crate) points: f64,
    pub(crate) order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) answers: Json<serde_json::Value>,
    pub(crate) score_total: f64,
    pub(crate) score_percentage: f64,
    pub(crate) grade: Option<String>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) ended_at: Option<PrimitiveDateTime>,
    pub(crate) total_time_seconds: Option<i64>,
    pub(crate) time_limit_seconds: Option<i64>,
    pub(crate) auto_graded: bool,
    pub(crate) evaluated_by: Option<String>,
    pub(crate) evaluated_at: Option<PrimitiveDateTime>,
    pub(crate) feedback: Option<String>,
    pub(crate) ai_insights: Option<Json<serde_json::Value>>,
    pub(crate) revaluation_requested: bool,
    pub(crate) revaluation_status: Option<RevaluationStatus>,
    pub(crate) revaluation_requested_at: Option<PrimitiveDateTime>,
    pub(crate) revaluation_reason: Option<String>,
    pub(crate) revaluation_handled_by: Option<String>,
    pub(crate) revaluation_handled_at: Option<PrimitiveDateTime>,
    pub(crate) revaluation_response: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Competition {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) title: String,
    pub(crate) status: CompetitionStatus,
    pub(crate) starts_at: PrimitiveDateTime,
    pub(crate) ends_at: PrimitiveDateTime,
    pub(crate) created_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct CompetitionParticipant {
    pub(crate) competition_id: String,
    pub(crate) user_id: String,
    pub(crate) status: ParticipantStatus,
    pub(crate) registered_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct LeaderboardEntry {
    pub(crate) id: String,
    pub(crate) competition_id: String,
    pub(crate) user_id: String,
    pub(crate) submission_id: String,
    pub(crate) score: f64,
    pub(crate) percentage: f64,
    pub(crate) completion_time_seconds: i64,
    pub(crate) rank: i32,
    pub(crate) updated_at: PrimitiveDateTime,
}
