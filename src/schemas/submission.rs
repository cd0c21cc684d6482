use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Submission;
use crate::db::types::{RevaluationStatus, SubmissionStatus};
use crate::schemas::quiz::QuizResponse;
use crate::services::attempts::{AttemptStart, SanitizedQuestion};
use crate::services::evaluation::{ManualGrade, RevaluationDecision};
use crate::services::scoring::SubmittedAnswer;

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitAttemptRequest {
    #[serde(default)]
    pub(crate) answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EvaluateRequest {
    #[serde(default)]
    pub(crate) feedback: Option<String>,
    #[serde(default)]
    pub(crate) grades: Vec<ManualGrade>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RevaluationRequestBody {
    #[validate(length(min = 1, message = "reason must not be empty"))]
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HandleRevaluationRequest {
    pub(crate) decision: RevaluationDecision,
    #[serde(default)]
    pub(crate) response: Option<String>,
    #[serde(default)]
    #[serde(alias = "newGrades")]
    pub(crate) new_grades: Option<Vec<ManualGrade>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoreResponse {
    pub(crate) total: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RevaluationResponse {
    pub(crate) requested: bool,
    pub(crate) status: Option<RevaluationStatus>,
    pub(crate) requested_at: Option<String>,
    pub(crate) reason: Option<String>,
    pub(crate) handled_by: Option<String>,
    pub(crate) handled_at: Option<String>,
    pub(crate) response: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) answers: serde_json::Value,
    pub(crate) score: ScoreResponse,
    pub(crate) started_at: String,
    pub(crate) ended_at: Option<String>,
    pub(crate) total_time_seconds: Option<i64>,
    pub(crate) time_limit_seconds: Option<i64>,
    pub(crate) auto_graded: bool,
    pub(crate) evaluated_by: Option<String>,
    pub(crate) evaluated_at: Option<String>,
    pub(crate) feedback: Option<String>,
    pub(crate) ai_insights: Option<serde_json::Value>,
    pub(crate) revaluation: RevaluationResponse,
}

impl SubmissionResponse {
    pub(crate) fn from_db(submission: Submission) -> Self {
        Self {
            id: submission.id,
            quiz_id: submission.quiz_id,
            student_id: submission.student_id,
            status: submission.status,
            answers: submission.answers.0,
            score: ScoreResponse {
                total: submission.score_total,
                percentage: submission.score_percentage,
                grade: submission.grade,
            },
            started_at: format_primitive(submission.started_at),
            ended_at: submission.ended_at.map(format_primitive),
            total_time_seconds: submission.total_time_seconds,
            time_limit_seconds: submission.time_limit_seconds,
            auto_graded: submission.auto_graded,
            evaluated_by: submission.evaluated_by,
            evaluated_at: submission.evaluated_at.map(format_primitive),
            feedback: submission.feedback,
            ai_insights: submission.ai_insights.map(|value| value.0),
            revaluation: RevaluationResponse {
                requested: submission.revaluation_requested,
                status: submission.revaluation_status,
                requested_at: submission.revaluation_requested_at.map(format_primitive),
                reason: submission.revaluation_reason,
                handled_by: submission.revaluation_handled_by,
                handled_at: submission.revaluation_handled_at.map(format_primitive),
                response: submission.revaluation_response,
            },
        }
    }
}

/// What the student sees when an attempt opens: the submission shell and
/// the quiz with answers stripped.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptStartResponse {
    pub(crate) submission: SubmissionResponse,
    pub(crate) quiz: QuizResponse,
    pub(crate) questions: Vec<SanitizedQuestion>,
}

impl AttemptStartResponse {
    pub(crate) fn from_service(start: AttemptStart) -> Self {
        Self {
            submission: SubmissionResponse::from_db(start.submission),
            quiz: QuizResponse::from_db(start.quiz),
            questions: start.questions,
        }
    }
}
