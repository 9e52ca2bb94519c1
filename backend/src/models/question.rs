// src/models/question.rs

use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// Declared type of a question. Drives answer validation and grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    ShortText,
    Essay,
    FileUpload,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::ShortText => "short_text",
            QuestionType::Essay => "essay",
            QuestionType::FileUpload => "file_upload",
        }
    }

    /// Choice questions can be scored without a human.
    pub fn is_auto_gradable(&self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultipleChoice)
    }

    pub fn has_options(&self) -> bool {
        self.is_auto_gradable()
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_choice" => Ok(QuestionType::SingleChoice),
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "short_text" => Ok(QuestionType::ShortText),
            "essay" => Ok(QuestionType::Essay),
            "file_upload" => Ok(QuestionType::FileUpload),
            other => Err(AppError::InternalServerError(format!(
                "Unknown question type '{}'",
                other
            ))),
        }
    }
}

/// One selectable option, e.g. `{ "key": "A", "label": "Mortise and tenon" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub key: String,
    pub label: String,
}

/// A stored question, correct answer included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    /// Sanitized rich text.
    pub content: String,

    /// Ordered options. Empty for text and upload questions.
    pub options: Vec<QuestionOption>,

    /// Option keys that make up the correct answer (choice types only).
    pub correct_answer: Vec<String>,

    pub points: f64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    pub fn has_option(&self, key: &str) -> bool {
        self.options.iter().any(|o| o.key == key)
    }
}

/// DTO for sending a question to a test taker (no correct answer).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub options: Vec<QuestionOption>,
    pub points: f64,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            question_type: q.question_type,
            content: q.content.clone(),
            options: q.options.clone(),
            points: q.points,
        }
    }
}

/// Insert shape handed to the question repository.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question_type: QuestionType,
    pub content: String,
    pub options: Vec<QuestionOption>,
    pub correct_answer: Vec<String>,
    pub points: f64,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub correct_answer: Vec<String>,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub points: f64,
}

impl CreateQuestionRequest {
    /// Cross-field checks the derive cannot express: options and keys must fit the type.
    pub fn check_shape(&self) -> Result<(), AppError> {
        if !self.question_type.has_options() {
            if !self.options.is_empty() || !self.correct_answer.is_empty() {
                return Err(AppError::BadRequest(format!(
                    "{} questions take no options or correct answer",
                    self.question_type
                )));
            }
            return Ok(());
        }

        if self.options.is_empty() {
            return Err(AppError::BadRequest(
                "Choice questions need at least one option".to_string(),
            ));
        }

        let keys: HashSet<&str> = self.options.iter().map(|o| o.key.as_str()).collect();
        if let Some(unknown) = self
            .correct_answer
            .iter()
            .find(|k| !keys.contains(k.as_str()))
        {
            return Err(AppError::BadRequest(format!(
                "Correct answer '{}' is not an option key",
                unknown
            )));
        }

        let distinct: HashSet<&String> = self.correct_answer.iter().collect();
        match self.question_type {
            QuestionType::SingleChoice if distinct.len() != 1 => Err(AppError::BadRequest(
                "Single choice questions need exactly one correct key".to_string(),
            )),
            QuestionType::MultipleChoice if distinct.is_empty() => Err(AppError::BadRequest(
                "Multiple choice questions need at least one correct key".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn into_new_question(self, sanitized_content: String) -> NewQuestion {
        let mut correct_answer = self.correct_answer;
        correct_answer.sort();
        correct_answer.dedup();

        NewQuestion {
            question_type: self.question_type,
            content: sanitized_content,
            options: self.options,
            correct_answer,
            points: self.points,
        }
    }
}

fn validate_options(options: &[QuestionOption]) -> Result<(), validator::ValidationError> {
    let mut seen = HashSet::new();
    for opt in options {
        if opt.key.is_empty() || opt.key.len() > 50 {
            return Err(validator::ValidationError::new("invalid_option_key"));
        }
        if opt.label.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
        if !seen.insert(opt.key.as_str()) {
            return Err(validator::ValidationError::new("duplicate_option_key"));
        }
    }
    Ok(())
}
