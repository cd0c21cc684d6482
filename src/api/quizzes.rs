use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStaff, CurrentUser};
use crate::api::pagination::Pagination;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{QuestionOption, Quiz, User};
use crate::db::types::{QuestionKind, QuizStatus, UserRole};
use crate::repositories;
use crate::schemas::quiz::{
    AssignStudentRequest, GenerateQuestionsRequest, PracticeQuizRequest, QuestionCreate,
    QuestionResponse, QuizCreate, QuizResponse,
};
use crate::services::ai_review::GeneratedQuestion;
use crate::services::attempts::{sanitize_question, SanitizedQuestion};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_quiz).get(list_my_quizzes))
        .route("/generate", post(generate_questions))
        .route("/practice", post(practice_quiz))
        .route("/:quiz_id", get(get_quiz))
        .route("/:quiz_id/publish", post(publish_quiz))
        .route("/:quiz_id/assign", post(assign_student))
}

/// Either a full or an answer-stripped question list, depending on who asks.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum QuestionView {
    Full(Vec<QuestionResponse>),
    Sanitized(Vec<SanitizedQuestion>),
}

#[derive(Debug, Serialize)]
struct QuizDetailResponse {
    #[serde(flatten)]
    quiz: QuizResponse,
    questions: QuestionView,
}

fn check_question_consistency(question: &QuestionCreate) -> Result<(), ApiError> {
    match question.kind {
        QuestionKind::MultipleChoice => {
            if question.options.len() < 2 {
                return Err(ApiError::BadRequest(
                    "multiple-choice question needs at least two options".to_string(),
                ));
            }
            let correct = question.options.iter().filter(|option| option.is_correct).count();
            if correct != 1 {
                return Err(ApiError::BadRequest(
                    "multiple-choice question needs exactly one correct option".to_string(),
                ));
            }
        }
        QuestionKind::TrueFalse => {
            let valid = question
                .correct_answer
                .as_deref()
                .is_some_and(|answer| answer.eq_ignore_ascii_case("true") || answer.eq_ignore_ascii_case("false"));
            if !valid {
                return Err(ApiError::BadRequest(
                    "true-false question needs correct_answer \"true\" or \"false\"".to_string(),
                ));
            }
        }
        QuestionKind::ShortAnswer => {
            if question.correct_answer.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(ApiError::BadRequest(
                    "short-answer question needs a correct_answer".to_string(),
                ));
            }
        }
        QuestionKind::Essay => {}
    }
    Ok(())
}

async fn create_quiz(
    State(state): State<AppState>,
    CurrentStaff(user): CurrentStaff,
    Json(payload): Json<QuizCreate>,
) -> Result<(StatusCode, Json<QuizDetailResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    for question in &payload.questions {
        check_question_consistency(question)?;
    }
    if let (Some(opens), Some(closes)) = (payload.opens_at, payload.closes_at) {
        if closes <= opens {
            return Err(ApiError::BadRequest("quiz must close after it opens".to_string()));
        }
    }

    let now = primitive_now_utc();
    let quiz_id = Uuid::new_v4().to_string();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to open transaction"))?;

    let quiz = repositories::quizzes::create(
        &mut *tx,
        repositories::quizzes::CreateQuiz {
            id: &quiz_id,
            title: &payload.title,
            description: payload.description.as_deref(),
            creator_id: &user.id,
            status: QuizStatus::Draft,
            is_public: payload.is_public,
            time_limit_minutes: payload.time_limit_minutes,
            allow_retake: payload.allow_retake,
            auto_grade: payload.auto_grade,
            passing_score: payload.passing_score,
            opens_at: payload.opens_at,
            closes_at: payload.closes_at,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create quiz"))?;

    for (index, question) in payload.questions.iter().enumerate() {
        repositories::questions::create(
            &mut *tx,
            repositories::questions::CreateQuestion {
                id: &Uuid::new_v4().to_string(),
                quiz_id: &quiz_id,
                kind: question.kind,
                prompt: &question.prompt,
                options: question
                    .options
                    .iter()
                    .map(|option| QuestionOption {
                        text: option.text.clone(),
                        is_correct: option.is_correct,
                    })
                    .collect(),
                correct_answer: question.correct_answer.as_deref(),
                points: question.points,
                order_index: index as i32,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit quiz"))?;

    let questions = repositories::questions::list_by_quiz(state.db(), &quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;

    tracing::info!(quiz_id, creator_id = %user.id, "quiz created");

    Ok((
        StatusCode::CREATED,
        Json(QuizDetailResponse {
            quiz: QuizResponse::from_db(quiz),
            questions: QuestionView::Full(
                questions.into_iter().map(QuestionResponse::from_db).collect(),
            ),
        }),
    ))
}

async fn list_my_quizzes(
    State(state): State<AppState>,
    CurrentStaff(user): CurrentStaff,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<QuizResponse>>, ApiError> {
    let quizzes =
        repositories::quizzes::list_by_creator(state.db(), &user.id, pagination.skip, pagination.limit)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list quizzes"))?;

    Ok(Json(quizzes.into_iter().map(QuizResponse::from_db).collect()))
}

fn can_see_answers(quiz: &Quiz, user: &User) -> bool {
    user.role == UserRole::Admin || quiz.creator_id == user.id
}

async fn get_quiz(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<String>,
) -> Result<Json<QuizDetailResponse>, ApiError> {
    let quiz = repositories::quizzes::find_by_id(state.db(), &quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz"))?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;

    let questions = repositories::questions::list_by_quiz(state.db(), &quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;

    let view = if can_see_answers(&quiz, &user) {
        QuestionView::Full(questions.into_iter().map(QuestionResponse::from_db).collect())
    } else {
        QuestionView::Sanitized(questions.iter().map(sanitize_question).collect())
    };

    Ok(Json(QuizDetailResponse { quiz: QuizResponse::from_db(quiz), questions: view }))
}

async fn publish_quiz(
    State(state): State<AppState>,
    CurrentStaff(user): CurrentStaff,
    Path(quiz_id): Path<String>,
) -> Result<Json<QuizResponse>, ApiError> {
    let quiz = repositories::quizzes::find_by_id(state.db(), &quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz"))?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;

    if !can_see_answers(&quiz, &user) {
        return Err(ApiError::Forbidden("Only the quiz owner may publish it"));
    }
    if quiz.status == QuizStatus::Archived {
        return Err(ApiError::Conflict("Archived quizzes cannot be published".to_string()));
    }

    repositories::quizzes::publish(state.db(), &quiz_id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to publish quiz"))?;

    let quiz = repositories::quizzes::find_by_id(state.db(), &quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz"))?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;

    tracing::info!(quiz_id, "quiz published");
    Ok(Json(QuizResponse::from_db(quiz)))
}

async fn assign_student(
    State(state): State<AppState>,
    CurrentStaff(user): CurrentStaff,
    Path(quiz_id): Path<String>,
    Json(payload): Json<AssignStudentRequest>,
) -> Result<StatusCode, ApiError> {
    let quiz = repositories::quizzes::find_by_id(state.db(), &quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz"))?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;

    if !can_see_answers(&quiz, &user) {
        return Err(ApiError::Forbidden("Only the quiz owner may assign students"));
    }

    let student = repositories::users::find_by_id(state.db(), &payload.student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load student"))?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    repositories::quizzes::assign_student(state.db(), &quiz_id, &student.id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to assign student"))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn generate_questions(
    State(state): State<AppState>,
    CurrentStaff(_user): CurrentStaff,
    Json(payload): Json<GenerateQuestionsRequest>,
) -> Result<Json<Vec<GeneratedQuestion>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let ai = state
        .ai()
        .ok_or_else(|| ApiError::ServiceUnavailable("AI generation is not configured".to_string()))?;

    let questions = ai
        .generate_questions_from_text(&payload.text, payload.count)
        .await
        .map_err(|e| ApiError::ServiceUnavailable(format!("AI generation failed: {e}")))?;

    Ok(Json(questions))
}

async fn practice_quiz(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Json(payload): Json<PracticeQuizRequest>,
) -> Result<Json<Vec<GeneratedQuestion>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let ai = state
        .ai()
        .ok_or_else(|| ApiError::ServiceUnavailable("AI generation is not configured".to_string()))?;

    let questions = ai
        .generate_practice_quiz(&payload.subject, &payload.difficulty, payload.count)
        .await
        .map_err(|e| ApiError::ServiceUnavailable(format!("AI generation failed: {e}")))?;

    Ok(Json(questions))
}

#[cfg(test)]
mod tests {
    use super::check_question_consistency;
    use crate::db::types::QuestionKind;
    use crate::schemas::quiz::{QuestionCreate, QuestionOptionCreate};

    fn base(kind: QuestionKind) -> QuestionCreate {
        QuestionCreate {
            kind,
            prompt: "prompt".to_string(),
            options: Vec::new(),
            correct_answer: None,
            points: 1.0,
        }
    }

    #[test]
    fn multiple_choice_requires_exactly_one_correct_option() {
        let mut question = base(QuestionKind::MultipleChoice);
        question.options = vec![
            QuestionOptionCreate { text: "A".to_string(), is_correct: true },
            QuestionOptionCreate { text: "B".to_string(), is_correct: false },
        ];
        assert!(check_question_consistency(&question).is_ok());

        question.options[1].is_correct = true;
        assert!(check_question_consistency(&question).is_err());

        question.options[0].is_correct = false;
        question.options[1].is_correct = false;
        assert!(check_question_consistency(&question).is_err());
    }

    #[test]
    fn true_false_requires_boolean_answer() {
        let mut question = base(QuestionKind::TrueFalse);
        assert!(check_question_consistency(&question).is_err());

        question.correct_answer = Some("True".to_string());
        assert!(check_question_consistency(&question).is_ok());

        question.correct_answer = Some("maybe".to_string());
        assert!(check_question_consistency(&question).is_err());
    }

    #[test]
    fn short_answer_requires_expected_text() {
        let mut question = base(QuestionKind::ShortAnswer);
        assert!(check_question_consistency(&question).is_err());

        question.correct_answer = Some("  ".to_string());
        assert!(check_question_consistency(&question).is_err());

        question.correct_answer = Some("chlorophyll".to_string());
        assert!(check_question_consistency(&question).is_ok());
    }

    #[test]
    fn essay_needs_no_answer_key() {
        assert!(check_question_consistency(&base(QuestionKind::Essay)).is_ok());
    }
}
