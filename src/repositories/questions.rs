use sqlx::PgPool;

use crate::db::models::{Question, QuestionOption};
use crate::db::types::QuestionKind;

const COLUMNS: &str =
    "id, quiz_id, kind, prompt, options, correct_answer, points, order_index";

pub(crate) async fn list_by_quiz(
    pool: &PgPool,
    quiz_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE quiz_id = $1 ORDER BY order_index"
    ))
    .bind(quiz_id)
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: &'a str,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) correct_answer: Option<&'a str>,
    pub(crate) points: f64,
    pub(crate) order_index: i32,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO questions (
            id, quiz_id, kind, prompt, options, correct_answer, points, order_index
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
    )
    .bind(params.id)
    .bind(params.quiz_id)
    .bind(params.kind)
    .bind(params.prompt)
    .bind(sqlx::types::Json(params.options))
    .bind(params.correct_answer)
    .bind(params.points)
    .bind(params.order_index)
    .execute(executor)
    .await?;
    Ok(())
}
