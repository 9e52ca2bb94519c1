// src/models/attempt.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::{
    error::AppError,
    models::{answer::AnswerValue, question::PublicQuestion},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    /// Submitted with at least one answer awaiting a human grader.
    Submitted,
    /// Submitted and every answer was auto-graded.
    Graded,
    Abandoned,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Graded => "graded",
            AttemptStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "submitted" => Ok(AttemptStatus::Submitted),
            "graded" => Ok(AttemptStatus::Graded),
            "abandoned" => Ok(AttemptStatus::Abandoned),
            other => Err(AppError::InternalServerError(format!(
                "Unknown attempt status '{}'",
                other
            ))),
        }
    }
}

/// Represents the 'attempts' table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: i64,
    pub exam_id: i64,
    pub user_id: i64,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: Option<i64>,
    pub total_score: Option<f64>,
}

/// One autosave entry. `answer` is raw JSON, validated against the question type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveEntry {
    pub question_id: i64,
    #[serde(default)]
    pub answer: Value,
}

/// DTO for `POST /attempts/{id}/autosave`.
#[derive(Debug, Deserialize, Validate)]
pub struct AutosaveRequest {
    #[validate(length(max = 500))]
    pub answers: Vec<AutosaveEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub attempt_id: i64,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ok: bool,
    pub total: f64,
}

/// One question of an attempt with the caller's answer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResultItem {
    pub position: i32,
    pub question: PublicQuestion,
    pub answer: Option<AnswerValue>,
    pub score: Option<f64>,
    pub is_graded: bool,
    /// Revealed only after the attempt leaves `in_progress`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<Vec<String>>,
}

/// Full read-only projection returned by `GET /attempts/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub items: Vec<AttemptResultItem>,
}
