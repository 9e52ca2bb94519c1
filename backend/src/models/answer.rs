// src/models/answer.rs

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::AppError,
    models::question::{Question, QuestionType},
};

/// Longest text answer accepted for short text and essay questions.
pub const MAX_TEXT_ANSWER_LEN: usize = 20_000;

/// A validated answer. Stored as `{"kind": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    SingleChoice(String),
    MultipleChoice(BTreeSet<String>),
    Text(String),
    Attachment(String),
}

impl AnswerValue {
    /// Converts raw client JSON into a typed answer for `question`.
    ///
    /// `null` clears the answer and yields `Ok(None)`.
    pub fn from_json(question: &Question, raw: &Value) -> Result<Option<Self>, AppError> {
        if raw.is_null() {
            return Ok(None);
        }

        let invalid = |what: &str| {
            AppError::BadRequest(format!(
                "Answer for question {} must be {}",
                question.id, what
            ))
        };

        let value = match question.question_type {
            QuestionType::SingleChoice => {
                let key = raw.as_str().ok_or_else(|| invalid("an option key"))?;
                if !question.has_option(key) {
                    return Err(invalid("one of the question's option keys"));
                }
                AnswerValue::SingleChoice(key.to_string())
            }
            QuestionType::MultipleChoice => {
                let items = raw
                    .as_array()
                    .ok_or_else(|| invalid("an array of option keys"))?;
                let mut keys = BTreeSet::new();
                for item in items {
                    let key = item
                        .as_str()
                        .ok_or_else(|| invalid("an array of option keys"))?;
                    if !question.has_option(key) {
                        return Err(invalid("made of the question's option keys"));
                    }
                    keys.insert(key.to_string());
                }
                AnswerValue::MultipleChoice(keys)
            }
            QuestionType::ShortText | QuestionType::Essay => {
                let text = raw.as_str().ok_or_else(|| invalid("a string"))?;
                if text.chars().count() > MAX_TEXT_ANSWER_LEN {
                    return Err(invalid("at most 20000 characters"));
                }
                AnswerValue::Text(text.to_string())
            }
            QuestionType::FileUpload => {
                let reference = raw
                    .as_str()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| invalid("a non-empty attachment reference"))?;
                AnswerValue::Attachment(reference.to_string())
            }
        };

        Ok(Some(value))
    }

    /// Option keys selected by this answer. Empty for non-choice answers.
    pub fn selected_keys(&self) -> BTreeSet<&str> {
        match self {
            AnswerValue::SingleChoice(key) => BTreeSet::from([key.as_str()]),
            AnswerValue::MultipleChoice(keys) => keys.iter().map(String::as_str).collect(),
            AnswerValue::Text(_) | AnswerValue::Attachment(_) => BTreeSet::new(),
        }
    }
}

/// Represents the 'answers' table: one row per (attempt, question).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub value: Option<AnswerValue>,
    /// Only set once `is_graded` is true.
    pub score: Option<f64>,
    pub is_graded: bool,
    pub updated_at: Option<DateTime<Utc>>,
}
