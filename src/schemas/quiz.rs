use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Question, QuestionOption, Quiz};
use crate::db::types::{QuestionKind, QuizStatus};
use crate::schemas::deserialize_option_datetime;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QuestionOptionCreate {
    pub(crate) text: String,
    #[serde(default)]
    #[serde(alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    pub(crate) kind: QuestionKind,
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) options: Vec<QuestionOptionCreate>,
    #[serde(default)]
    #[serde(alias = "correctAnswer")]
    pub(crate) correct_answer: Option<String>,
    #[serde(default = "default_points")]
    #[validate(range(exclusive_min = 0.0, message = "points must be positive"))]
    pub(crate) points: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuizCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[serde(alias = "isPublic")]
    pub(crate) is_public: bool,
    #[serde(default)]
    #[serde(alias = "timeLimitMinutes")]
    #[validate(range(min = 1, message = "time_limit_minutes must be positive"))]
    pub(crate) time_limit_minutes: Option<i32>,
    #[serde(default)]
    #[serde(alias = "allowRetake")]
    pub(crate) allow_retake: bool,
    #[serde(default = "default_true")]
    #[serde(alias = "autoGrade")]
    pub(crate) auto_grade: bool,
    #[serde(default = "default_passing_score")]
    #[serde(alias = "passingScore")]
    #[validate(range(min = 0.0, max = 100.0, message = "passing_score must be within 0..=100"))]
    pub(crate) passing_score: f64,
    #[serde(default)]
    #[serde(alias = "opensAt", deserialize_with = "deserialize_option_datetime")]
    pub(crate) opens_at: Option<PrimitiveDateTime>,
    #[serde(default)]
    #[serde(alias = "closesAt", deserialize_with = "deserialize_option_datetime")]
    pub(crate) closes_at: Option<PrimitiveDateTime>,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignStudentRequest {
    #[serde(alias = "studentId")]
    pub(crate) student_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GenerateQuestionsRequest {
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub(crate) text: String,
    #[serde(default = "default_question_count")]
    #[validate(range(min = 1, max = 50, message = "count must be within 1..=50"))]
    pub(crate) count: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct PracticeQuizRequest {
    #[validate(length(min = 1, message = "subject must not be empty"))]
    pub(crate) subject: String,
    #[serde(default = "default_difficulty")]
    pub(crate) difficulty: String,
    #[serde(default = "default_question_count")]
    #[validate(range(min = 1, max = 50, message = "count must be within 1..=50"))]
    pub(crate) count: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizResponse {
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
    pub(crate) opens_at: Option<String>,
    pub(crate) closes_at: Option<String>,
    pub(crate) stats_attempts: i64,
    pub(crate) stats_average_score: f64,
    pub(crate) created_at: String,
    pub(crate) published_at: Option<String>,
}

impl QuizResponse {
    pub(crate) fn from_db(quiz: Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title,
            description: quiz.description,
            creator_id: quiz.creator_id,
            status: quiz.status,
            is_public: quiz.is_public,
            time_limit_minutes: quiz.time_limit_minutes,
            allow_retake: quiz.allow_retake,
            auto_grade: quiz.auto_grade,
            passing_score: quiz.passing_score,
            opens_at: quiz.opens_at.map(format_primitive),
            closes_at: quiz.closes_at.map(format_primitive),
            stats_attempts: quiz.stats_attempts,
            stats_average_score: quiz.stats_average_score,
            created_at: format_primitive(quiz.created_at),
            published_at: quiz.published_at.map(format_primitive),
        }
    }
}

/// Owner-facing question view, correctness included.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) correct_answer: Option<String>,
    pub(crate) points: f64,
    pub(crate) order_index: i32,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question) -> Self {
        Self {
            id: question.id,
            quiz_id: question.quiz_id,
            kind: question.kind,
            prompt: question.prompt,
            options: question.options.0,
            correct_answer: question.correct_answer,
            points: question.points,
            order_index: question.order_index,
        }
    }
}

fn default_points() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_passing_score() -> f64 {
    60.0
}

fn default_question_count() -> u32 {
    5
}

fn default_difficulty() -> String {
    "medium".to_string()
}
