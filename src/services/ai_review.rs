use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use time::OffsetDateTime;

use crate::core::config::Settings;
use crate::db::models::{Question, QuestionOption, Quiz};
use crate::db::types::QuestionKind;
use crate::services::scoring::{GradedAnswer, Score};

const INSIGHT_SYSTEM_PROMPT: &str = r#"You are an experienced teacher reviewing a student's graded quiz attempt.
Analyze the graded answers and produce constructive feedback.

Response format (strict JSON):
{
  "strengths": ["topic or skill the student handled well"],
  "weaknesses": ["topic or skill the student struggled with"],
  "recommendations": ["concrete next step for the student"],
  "detailed_analysis": "a few paragraphs of analysis"
}
"#;

const GENERATION_SYSTEM_PROMPT: &str = r#"You are an expert quiz author.
Produce quiz questions as strict JSON:
{
  "questions": [
    {
      "kind": "multiple-choice" | "true-false" | "short-answer" | "essay",
      "prompt": "question text",
      "options": [{"text": "option text", "is_correct": true}],
      "correct_answer": "expected answer for non-multiple-choice kinds, else null",
      "points": <number>
    }
  ]
}
Multiple-choice questions must have exactly one option flagged correct.
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AiInsights {
    pub(crate) strengths: Vec<String>,
    pub(crate) weaknesses: Vec<String>,
    pub(crate) recommendations: Vec<String>,
    pub(crate) detailed_analysis: String,
    #[serde(rename = "_metadata", skip_serializing_if = "Option::is_none")]
    pub(crate) metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GeneratedQuestion {
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) options: Vec<QuestionOption>,
    #[serde(default)]
    pub(crate) correct_answer: Option<String>,
    pub(crate) points: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct AiReviewService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AiReviewService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ai().ai_request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().openai_api_key.clone(),
            base_url: settings.ai().openai_base_url.trim_end_matches('/').to_string(),
            model: settings.ai().ai_model.clone(),
            max_tokens: settings.ai().ai_max_tokens,
        })
    }

    pub(crate) async fn evaluate_submission(
        &self,
        quiz: &Quiz,
        questions: &[Question],
        graded: &[GradedAnswer],
        score: &Score,
    ) -> Result<AiInsights> {
        let started_at = OffsetDateTime::now_utc();
        let timer = Instant::now();

        let user_prompt = format!(
            "Quiz: {}\n\nQuestions:\n{}\n\nGraded answers:\n{}\n\nFinal score: {} points, {}%, grade {}.\n\nReview the attempt and respond in the JSON format from the system prompt.",
            quiz.title,
            serde_json::to_string_pretty(questions).unwrap_or_default(),
            serde_json::to_string_pretty(graded).unwrap_or_default(),
            score.total,
            score.percentage,
            score.grade.as_str(),
        );

        let (mut result, body) = self.chat(INSIGHT_SYSTEM_PROMPT, &user_prompt).await?;

        let elapsed = timer.elapsed().as_secs_f64();
        let completed_at = OffsetDateTime::now_utc();
        let tokens_used = body
            .get("usage")
            .and_then(|usage| usage.get("total_tokens"))
            .and_then(|value| value.as_u64());

        result["_metadata"] = json!({
            "request_started_at": started_at.format(&time::format_description::well_known::Rfc3339).unwrap_or_default(),
            "request_completed_at": completed_at.format(&time::format_description::well_known::Rfc3339).unwrap_or_default(),
            "duration_seconds": elapsed,
            "tokens_used": tokens_used,
            "model": self.model,
        });

        tracing::info!(
            quiz_id = %quiz.id,
            duration_seconds = elapsed,
            tokens_used = tokens_used,
            "AI insight completed"
        );

        serde_json::from_value(result).context("Failed to parse AI insights")
    }

    pub(crate) async fn generate_questions_from_text(
        &self,
        text: &str,
        count: u32,
    ) -> Result<Vec<GeneratedQuestion>> {
        let user_prompt = format!(
            "Source material:\n{text}\n\nGenerate {count} questions covering this material.\nRespond in the JSON format from the system prompt."
        );
        self.generate(&user_prompt).await
    }

    pub(crate) async fn generate_practice_quiz(
        &self,
        subject: &str,
        difficulty: &str,
        count: u32,
    ) -> Result<Vec<GeneratedQuestion>> {
        let user_prompt = format!(
            "Generate {count} practice questions on \"{subject}\" at {difficulty} difficulty.\nRespond in the JSON format from the system prompt."
        );
        self.generate(&user_prompt).await
    }

    async fn generate(&self, user_prompt: &str) -> Result<Vec<GeneratedQuestion>> {
        let (result, _) = self.chat(GENERATION_SYSTEM_PROMPT, user_prompt).await?;
        let questions = result
            .get("questions")
            .cloned()
            .context("Missing questions in AI response")?;
        serde_json::from_value(questions).context("Failed to parse generated questions")
    }

    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<(Value, Value)> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "max_completion_tokens": self.max_tokens,
            "response_format": {"type": "json_object"}
        });

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;
        let mut body = Value::Null;

        for attempt in 0..=3 {
            let response =
                self.client.post(&url).bearer_auth(&self.api_key).json(&payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    body = resp.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        last_error = None;
                        break;
                    }
                    last_error = Some(anyhow::anyhow!("OpenAI API error: {body}"));
                }
                Err(err) => {
                    last_error = Some(anyhow::anyhow!(err).context("Failed to call OpenAI API"));
                }
            }

            if attempt < 3 {
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt as u32))).await;
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|value| value.as_str())
            .context("Missing OpenAI response content")?;

        let result: Value = serde_json::from_str(content).context("Failed to parse AI JSON")?;
        Ok((result, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insights_parse_from_model_output() {
        let raw = json!({
            "strengths": ["algebra"],
            "weaknesses": ["geometry"],
            "recommendations": ["practice proofs"],
            "detailed_analysis": "Solid overall."
        });

        let insights: AiInsights = serde_json::from_value(raw).unwrap();
        assert_eq!(insights.strengths, vec!["algebra"]);
        assert!(insights.metadata.is_none());
    }

    #[test]
    fn generated_questions_parse_with_defaults() {
        let raw = json!([
            {
                "kind": "multiple-choice",
                "prompt": "Pick one",
                "options": [
                    {"text": "A", "is_correct": true},
                    {"text": "B", "is_correct": false}
                ],
                "points": 2.0
            },
            {"kind": "essay", "prompt": "Discuss", "points": 10.0}
        ]);

        let questions: Vec<GeneratedQuestion> = serde_json::from_value(raw).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].options.len(), 2);
        assert!(questions[1].options.is_empty());
        assert!(questions[1].correct_answer.is_none());
    }
}
