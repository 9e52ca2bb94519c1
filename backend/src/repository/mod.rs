// src/repository/mod.rs

//! Persistence capabilities used by the attempt service.
//!
//! Each trait covers one entity. `PgStore` implements all of them on
//! Postgres; `InMemoryStore` implements them on a mutex-guarded map for
//! tests and database-less local runs.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        answer::{Answer, AnswerValue},
        attempt::Attempt,
        exam::{Exam, ExamQuestion, NewExam},
        question::{NewQuestion, Question},
    },
};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait QuestionRepo: Send + Sync {
    async fn create_question(&self, new: NewQuestion) -> Result<Question, AppError>;

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError>;

    /// Fetches the subset of `ids` that exist, in no particular order.
    async fn get_questions(&self, ids: &[i64]) -> Result<Vec<Question>, AppError>;

    async fn list_questions(&self) -> Result<Vec<Question>, AppError>;
}

#[async_trait]
pub trait ExamRepo: Send + Sync {
    /// Stores the exam and its question references (position = index in `question_ids`).
    async fn create_exam(&self, new: NewExam) -> Result<Exam, AppError>;

    async fn get_exam(&self, id: i64) -> Result<Option<Exam>, AppError>;

    /// Questions of an exam ordered by position.
    async fn list_exam_questions(&self, exam_id: i64) -> Result<Vec<ExamQuestion>, AppError>;
}

#[async_trait]
pub trait AttemptRepo: Send + Sync {
    /// Creates an in-progress attempt together with one empty answer per
    /// question id. Either both are stored or neither is.
    async fn create_attempt_with_answers(
        &self,
        exam_id: i64,
        user_id: i64,
        started_at: DateTime<Utc>,
        question_ids: &[i64],
    ) -> Result<Attempt, AppError>;

    async fn get_attempt(&self, id: i64) -> Result<Option<Attempt>, AppError>;

    /// Most recent in-progress attempt of `user_id` on `exam_id`, if any.
    async fn find_in_progress(&self, exam_id: i64, user_id: i64)
    -> Result<Option<Attempt>, AppError>;

    /// Overwrites status, submit time, elapsed time and total score.
    async fn update_attempt(&self, attempt: &Attempt) -> Result<(), AppError>;

    /// Attempts of a user, newest first.
    async fn list_attempts_for_user(&self, user_id: i64) -> Result<Vec<Attempt>, AppError>;
}

#[async_trait]
pub trait AnswerRepo: Send + Sync {
    async fn list_answers(&self, attempt_id: i64) -> Result<Vec<Answer>, AppError>;

    /// Overwrites the value of the `(attempt_id, question_id)` row.
    /// Returns `false` when no such row exists.
    async fn save_answer_value(
        &self,
        attempt_id: i64,
        question_id: i64,
        value: Option<&AnswerValue>,
    ) -> Result<bool, AppError>;

    /// Records a grading outcome. `score` must be `None` when `is_graded` is false.
    async fn record_grade(
        &self,
        answer_id: i64,
        score: Option<f64>,
        is_graded: bool,
    ) -> Result<(), AppError>;
}

/// The capability set injected into the service and handlers.
#[derive(Clone)]
pub struct Repositories {
    pub questions: Arc<dyn QuestionRepo>,
    pub exams: Arc<dyn ExamRepo>,
    pub attempts: Arc<dyn AttemptRepo>,
    pub answers: Arc<dyn AnswerRepo>,
}

impl Repositories {
    /// Wires every capability to one backing store.
    pub fn from_store<S>(store: S) -> Self
    where
        S: QuestionRepo + ExamRepo + AttemptRepo + AnswerRepo + 'static,
    {
        let store = Arc::new(store);
        Self {
            questions: store.clone(),
            exams: store.clone(),
            attempts: store.clone(),
            answers: store,
        }
    }
}
