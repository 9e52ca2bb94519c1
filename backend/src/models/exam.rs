// src/models/exam.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{PublicQuestion, Question},
};

/// Represents the 'exams' table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    pub created_by: i64,
    pub created_at: Option<DateTime<Utc>>,
}

/// A question as placed in an exam (0-based position).
#[derive(Debug, Clone, PartialEq)]
pub struct ExamQuestion {
    pub position: i32,
    pub question: Question,
}

/// Public view of an exam: questions in order, answers stripped.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamView {
    #[serde(flatten)]
    pub exam: Exam,
    pub questions: Vec<PublicQuestion>,
}

/// Insert shape handed to the exam repository.
#[derive(Debug, Clone)]
pub struct NewExam {
    pub title: String,
    pub description: Option<String>,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub shuffle_questions: bool,
    pub shuffle_options: bool,
    pub created_by: i64,
    /// Question ids in exam order.
    pub question_ids: Vec<i64>,
}

/// DTO for creating an exam.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_options: bool,
    #[validate(length(min = 1, max = 500))]
    pub question_ids: Vec<i64>,
}

impl CreateExamRequest {
    pub fn check_shape(&self) -> Result<(), AppError> {
        if let (Some(open), Some(close)) = (self.opens_at, self.closes_at) {
            if close <= open {
                return Err(AppError::BadRequest(
                    "closesAt must be after opensAt".to_string(),
                ));
            }
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.question_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(AppError::BadRequest(format!(
                "Question {} appears more than once",
                dup
            )));
        }
        Ok(())
    }

    pub fn into_new_exam(self, created_by: i64) -> NewExam {
        NewExam {
            title: self.title,
            description: self.description,
            opens_at: self.opens_at,
            closes_at: self.closes_at,
            duration_minutes: self.duration_minutes,
            shuffle_questions: self.shuffle_questions,
            shuffle_options: self.shuffle_options,
            created_by,
            question_ids: self.question_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(ids: Vec<i64>) -> CreateExamRequest {
        CreateExamRequest {
            title: "Timber framing basics".to_string(),
            description: None,
            opens_at: None,
            closes_at: None,
            duration_minutes: Some(30),
            shuffle_questions: false,
            shuffle_options: false,
            question_ids: ids,
        }
    }

    #[test]
    fn duplicate_question_ids_are_rejected() {
        assert!(request(vec![1, 2, 1]).check_shape().is_err());
        assert!(request(vec![1, 2, 3]).check_shape().is_ok());
    }

    #[test]
    fn close_must_follow_open() {
        let mut req = request(vec![1]);
        let now = Utc::now();
        req.opens_at = Some(now);
        req.closes_at = Some(now - chrono::Duration::minutes(5));
        assert!(req.check_shape().is_err());
    }

    #[test]
    fn empty_question_list_fails_validation() {
        assert!(request(vec![]).validate().is_err());
    }
}
