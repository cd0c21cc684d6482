//! Pure grading and score computation. No I/O: every function here is a
//! deterministic mapping from questions and answers to graded results, so
//! it can be reapplied identically wherever a score must be recomputed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::config::UnmatchedAnswerPolicy;
use crate::db::models::Question;
use crate::db::types::QuestionKind;
use crate::services::errors::EngineError;

/// A student's answer, tagged by the question kind it responds to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum AnswerValue {
    MultipleChoice { selected: String },
    TrueFalse { value: String },
    ShortAnswer { text: String },
    Essay { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SubmittedAnswer {
    pub(crate) question_id: String,
    pub(crate) answer: AnswerValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GradedAnswer {
    pub(crate) question_id: String,
    pub(crate) answer: Option<AnswerValue>,
    pub(crate) is_correct: bool,
    pub(crate) points_awarded: f64,
    pub(crate) needs_manual: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Score {
    pub(crate) total: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: LetterGrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "F")]
    F,
}

impl LetterGrade {
    pub(crate) fn from_percentage(percentage: f64) -> Self {
        match percentage {
            p if p >= 95.0 => Self::APlus,
            p if p >= 90.0 => Self::A,
            p if p >= 85.0 => Self::BPlus,
            p if p >= 80.0 => Self::B,
            p if p >= 75.0 => Self::CPlus,
            p if p >= 70.0 => Self::C,
            p if p >= 60.0 => Self::D,
            _ => Self::F,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

/// Grade a set of submitted answers against the quiz questions.
///
/// Questions are graded in quiz order. Unanswered questions score zero and
/// are never penalized. Answers whose question_id matches no question are
/// dropped or rejected according to `policy`.
pub(crate) fn grade_answers(
    questions: &[Question],
    answers: &[SubmittedAnswer],
    policy: UnmatchedAnswerPolicy,
) -> Result<Vec<GradedAnswer>, EngineError> {
    let known: HashMap<&str, &Question> =
        questions.iter().map(|question| (question.id.as_str(), question)).collect();

    if policy == UnmatchedAnswerPolicy::Reject {
        for answer in answers {
            if !known.contains_key(answer.question_id.as_str()) {
                return Err(EngineError::validation(format!(
                    "answer references unknown question {}",
                    answer.question_id
                )));
            }
        }
    }

    let mut by_question: HashMap<&str, &SubmittedAnswer> = HashMap::new();
    for answer in answers {
        by_question.entry(answer.question_id.as_str()).or_insert(answer);
    }

    let mut graded = Vec::with_capacity(questions.len());
    for question in questions {
        let graded_answer = match by_question.get(question.id.as_str()) {
            Some(answer) => grade_one(question, answer)?,
            None => GradedAnswer {
                question_id: question.id.clone(),
                answer: None,
                is_correct: false,
                points_awarded: 0.0,
                needs_manual: false,
            },
        };
        graded.push(graded_answer);
    }

    Ok(graded)
}

fn grade_one(question: &Question, answer: &SubmittedAnswer) -> Result<GradedAnswer, EngineError> {
    let (is_correct, needs_manual) = match (question.kind, &answer.answer) {
        (QuestionKind::MultipleChoice, AnswerValue::MultipleChoice { selected }) => {
            let correct = question
                .options
                .0
                .iter()
                .find(|option| option.is_correct)
                .is_some_and(|option| option.text == *selected);
            (correct, false)
        }
        (QuestionKind::TrueFalse, AnswerValue::TrueFalse { value }) => {
            let correct = question
                .correct_answer
                .as_deref()
                .is_some_and(|expected| expected.eq_ignore_ascii_case(value));
            (correct, false)
        }
        (QuestionKind::ShortAnswer, AnswerValue::ShortAnswer { text }) => {
            let correct = question
                .correct_answer
                .as_deref()
                .is_some_and(|expected| expected.trim().eq_ignore_ascii_case(text.trim()));
            (correct, false)
        }
        // Essays are never auto-gradable.
        (QuestionKind::Essay, AnswerValue::Essay { .. }) => (false, true),
        (kind, _) => {
            return Err(EngineError::validation(format!(
                "answer for question {} does not match its kind {kind:?}",
                question.id
            )));
        }
    };

    Ok(GradedAnswer {
        question_id: question.id.clone(),
        answer: Some(answer.answer.clone()),
        is_correct,
        points_awarded: if is_correct { question.points } else { 0.0 },
        needs_manual,
    })
}

/// Total earned points, rounded percentage and letter grade.
pub(crate) fn compute_score(graded: &[GradedAnswer], questions: &[Question]) -> Score {
    let total: f64 = graded.iter().map(|answer| answer.points_awarded).sum();
    let possible: f64 = questions.iter().map(|question| question.points).sum();

    let percentage = if possible > 0.0 { (100.0 * total / possible).round() } else { 0.0 };

    Score { total, percentage, grade: LetterGrade::from_percentage(percentage) }
}

pub(crate) fn answers_to_json(graded: &[GradedAnswer]) -> serde_json::Value {
    serde_json::to_value(graded).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
}

pub(crate) fn answers_from_json(value: &serde_json::Value) -> Result<Vec<GradedAnswer>, EngineError> {
    serde_json::from_value(value.clone())
        .map_err(|err| EngineError::validation(format!("stored answers are malformed: {err}")))
}

#[cfg(test)]
mod tests {
    use sqlx::types::Json;

    use super::*;
    use crate::db::models::QuestionOption;

    fn question(id: &str, kind: QuestionKind, points: f64) -> Question {
        Question {
            id: id.to_string(),
            quiz_id: "quiz-1".to_string(),
            kind,
            prompt: format!("prompt {id}"),
            options: Json(Vec::new()),
            correct_answer: None,
            points,
            order_index: 0,
        }
    }

    fn multiple_choice(id: &str, correct: &str, wrong: &str, points: f64) -> Question {
        let mut q = question(id, QuestionKind::MultipleChoice, points);
        q.options = Json(vec![
            QuestionOption { text: correct.to_string(), is_correct: true },
            QuestionOption { text: wrong.to_string(), is_correct: false },
        ]);
        q
    }

    fn short_answer(id: &str, expected: &str, points: f64) -> Question {
        let mut q = question(id, QuestionKind::ShortAnswer, points);
        q.correct_answer = Some(expected.to_string());
        q
    }

    fn answer(question_id: &str, value: AnswerValue) -> SubmittedAnswer {
        SubmittedAnswer { question_id: question_id.to_string(), answer: value }
    }

    #[test]
    fn multiple_choice_exact_match() {
        let questions = vec![multiple_choice("q1", "Oxygen", "Hydrogen", 2.0)];
        let answers =
            vec![answer("q1", AnswerValue::MultipleChoice { selected: "Oxygen".to_string() })];

        let graded =
            grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop).expect("graded");
        assert!(graded[0].is_correct);
        assert_eq!(graded[0].points_awarded, 2.0);
    }

    #[test]
    fn multiple_choice_is_case_sensitive() {
        let questions = vec![multiple_choice("q1", "Oxygen", "Hydrogen", 2.0)];
        let answers =
            vec![answer("q1", AnswerValue::MultipleChoice { selected: "oxygen".to_string() })];

        let graded =
            grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop).expect("graded");
        assert!(!graded[0].is_correct);
        assert_eq!(graded[0].points_awarded, 0.0);
    }

    #[test]
    fn true_false_is_case_insensitive() {
        let mut q = question("q1", QuestionKind::TrueFalse, 1.0);
        q.correct_answer = Some("True".to_string());

        let answers = vec![answer("q1", AnswerValue::TrueFalse { value: "true".to_string() })];
        let graded = grade_answers(&[q], &answers, UnmatchedAnswerPolicy::Drop).expect("graded");
        assert!(graded[0].is_correct);
    }

    #[test]
    fn short_answer_trims_and_ignores_case() {
        let questions = vec![short_answer("q1", "Photosynthesis", 3.0)];
        let answers = vec![answer(
            "q1",
            AnswerValue::ShortAnswer { text: "  photosynthesis  ".to_string() },
        )];

        let graded =
            grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop).expect("graded");
        assert!(graded[0].is_correct);
        assert_eq!(graded[0].points_awarded, 3.0);
    }

    #[test]
    fn short_answer_no_partial_credit() {
        let questions = vec![short_answer("q1", "Photosynthesis", 3.0)];
        let answers =
            vec![answer("q1", AnswerValue::ShortAnswer { text: "Photosynthesi".to_string() })];

        let graded =
            grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop).expect("graded");
        assert!(!graded[0].is_correct);
        assert_eq!(graded[0].points_awarded, 0.0);
    }

    #[test]
    fn essay_always_needs_manual_grading() {
        let questions = vec![question("q1", QuestionKind::Essay, 10.0)];
        let answers =
            vec![answer("q1", AnswerValue::Essay { text: "A long answer.".to_string() })];

        let graded =
            grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop).expect("graded");
        assert!(!graded[0].is_correct);
        assert_eq!(graded[0].points_awarded, 0.0);
        assert!(graded[0].needs_manual);
    }

    #[test]
    fn unanswered_questions_score_zero() {
        let questions =
            vec![multiple_choice("q1", "A", "B", 1.0), short_answer("q2", "answer", 1.0)];
        let answers = vec![answer("q1", AnswerValue::MultipleChoice { selected: "A".to_string() })];

        let graded =
            grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop).expect("graded");
        assert_eq!(graded.len(), 2);
        assert!(graded[1].answer.is_none());
        assert!(!graded[1].is_correct);
        assert_eq!(graded[1].points_awarded, 0.0);
    }

    #[test]
    fn unmatched_answers_dropped_by_default() {
        let questions = vec![multiple_choice("q1", "A", "B", 1.0)];
        let answers = vec![
            answer("q1", AnswerValue::MultipleChoice { selected: "A".to_string() }),
            answer("ghost", AnswerValue::ShortAnswer { text: "whatever".to_string() }),
        ];

        let graded =
            grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop).expect("graded");
        assert_eq!(graded.len(), 1);
    }

    #[test]
    fn unmatched_answers_rejected_when_configured() {
        let questions = vec![multiple_choice("q1", "A", "B", 1.0)];
        let answers =
            vec![answer("ghost", AnswerValue::ShortAnswer { text: "whatever".to_string() })];

        let result = grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Reject);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn mismatched_answer_kind_is_rejected() {
        let questions = vec![multiple_choice("q1", "A", "B", 1.0)];
        let answers = vec![answer("q1", AnswerValue::Essay { text: "essay".to_string() })];

        let result = grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn two_correct_answers_give_full_marks() {
        let questions =
            vec![multiple_choice("q1", "A", "B", 1.0), multiple_choice("q2", "C", "D", 1.0)];
        let answers = vec![
            answer("q1", AnswerValue::MultipleChoice { selected: "A".to_string() }),
            answer("q2", AnswerValue::MultipleChoice { selected: "C".to_string() }),
        ];

        let graded =
            grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop).expect("graded");
        let score = compute_score(&graded, &questions);
        assert_eq!(score.total, 2.0);
        assert_eq!(score.percentage, 100.0);
        assert_eq!(score.grade, LetterGrade::APlus);
    }

    #[test]
    fn one_of_two_correct_gives_half_marks() {
        let questions =
            vec![multiple_choice("q1", "A", "B", 1.0), multiple_choice("q2", "C", "D", 1.0)];
        let answers = vec![
            answer("q1", AnswerValue::MultipleChoice { selected: "A".to_string() }),
            answer("q2", AnswerValue::MultipleChoice { selected: "D".to_string() }),
        ];

        let graded =
            grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop).expect("graded");
        let score = compute_score(&graded, &questions);
        assert_eq!(score.total, 1.0);
        assert_eq!(score.percentage, 50.0);
        assert_eq!(score.grade, LetterGrade::F);
    }

    #[test]
    fn zero_possible_points_scores_zero_percent() {
        let questions: Vec<Question> = Vec::new();
        let graded = grade_answers(&questions, &[], UnmatchedAnswerPolicy::Drop).expect("graded");
        let score = compute_score(&graded, &questions);
        assert_eq!(score.percentage, 0.0);
        assert_eq!(score.grade, LetterGrade::F);
    }

    #[test]
    fn percentage_is_rounded() {
        let questions = vec![
            multiple_choice("q1", "A", "B", 1.0),
            multiple_choice("q2", "C", "D", 1.0),
            multiple_choice("q3", "E", "F", 1.0),
        ];
        let answers = vec![
            answer("q1", AnswerValue::MultipleChoice { selected: "A".to_string() }),
            answer("q2", AnswerValue::MultipleChoice { selected: "C".to_string() }),
        ];

        let graded =
            grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop).expect("graded");
        let score = compute_score(&graded, &questions);
        // 2/3 = 66.666... rounds to 67
        assert_eq!(score.percentage, 67.0);
        assert_eq!(score.grade, LetterGrade::D);
    }

    #[test]
    fn grade_thresholds_at_boundaries() {
        assert_eq!(LetterGrade::from_percentage(95.0), LetterGrade::APlus);
        assert_eq!(LetterGrade::from_percentage(94.99), LetterGrade::A);
        assert_eq!(LetterGrade::from_percentage(90.0), LetterGrade::A);
        assert_eq!(LetterGrade::from_percentage(89.9), LetterGrade::BPlus);
        assert_eq!(LetterGrade::from_percentage(85.0), LetterGrade::BPlus);
        assert_eq!(LetterGrade::from_percentage(80.0), LetterGrade::B);
        assert_eq!(LetterGrade::from_percentage(75.0), LetterGrade::CPlus);
        assert_eq!(LetterGrade::from_percentage(70.0), LetterGrade::C);
        assert_eq!(LetterGrade::from_percentage(60.0), LetterGrade::D);
        assert_eq!(LetterGrade::from_percentage(59.9), LetterGrade::F);
        assert_eq!(LetterGrade::from_percentage(0.0), LetterGrade::F);
    }

    #[test]
    fn answer_value_serde_is_tagged_by_kind() {
        let value = AnswerValue::MultipleChoice { selected: "A".to_string() };
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["type"], "multiple-choice");
        assert_eq!(json["selected"], "A");

        let parsed: AnswerValue =
            serde_json::from_value(serde_json::json!({"type": "short-answer", "text": "hi"}))
                .unwrap();
        assert!(matches!(parsed, AnswerValue::ShortAnswer { .. }));
    }

    #[test]
    fn graded_answers_json_roundtrip() {
        let questions = vec![multiple_choice("q1", "A", "B", 1.0)];
        let answers = vec![answer("q1", AnswerValue::MultipleChoice { selected: "A".to_string() })];
        let graded =
            grade_answers(&questions, &answers, UnmatchedAnswerPolicy::Drop).expect("graded");

        let value = answers_to_json(&graded);
        let restored = answers_from_json(&value).expect("restored");
        assert_eq!(restored.len(), 1);
        assert!(restored[0].is_correct);
    }
}
