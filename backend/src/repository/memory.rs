// src/repository/memory.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        answer::{Answer, AnswerValue},
        attempt::{Attempt, AttemptStatus},
        exam::{Exam, ExamQuestion, NewExam},
        question::{NewQuestion, Question},
    },
    repository::{AnswerRepo, AttemptRepo, ExamRepo, QuestionRepo},
};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    questions: HashMap<i64, Question>,
    exams: HashMap<i64, Exam>,
    /// exam id -> question ids in position order
    exam_questions: HashMap<i64, Vec<i64>>,
    attempts: HashMap<i64, Attempt>,
    answers: HashMap<i64, Answer>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Mutex-guarded store for tests and runs without `DATABASE_URL`.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, AppError> {
        self.state
            .lock()
            .map_err(|e| AppError::InternalServerError(e.to_string()))
    }
}

#[async_trait]
impl QuestionRepo for InMemoryStore {
    async fn create_question(&self, new: NewQuestion) -> Result<Question, AppError> {
        let mut state = self.lock()?;
        let question = Question {
            id: state.next_id(),
            question_type: new.question_type,
            content: new.content,
            options: new.options,
            correct_answer: new.correct_answer,
            points: new.points,
            created_at: Some(Utc::now()),
        };
        state.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        Ok(self.lock()?.questions.get(&id).cloned())
    }

    async fn get_questions(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        let state = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.questions.get(id).cloned())
            .collect())
    }

    async fn list_questions(&self) -> Result<Vec<Question>, AppError> {
        let state = self.lock()?;
        let mut questions: Vec<Question> = state.questions.values().cloned().collect();
        questions.sort_by_key(|q| std::cmp::Reverse(q.id));
        Ok(questions)
    }
}

#[async_trait]
impl ExamRepo for InMemoryStore {
    async fn create_exam(&self, new: NewExam) -> Result<Exam, AppError> {
        let mut state = self.lock()?;
        let exam = Exam {
            id: state.next_id(),
            title: new.title,
            description: new.description,
            opens_at: new.opens_at,
            closes_at: new.closes_at,
            duration_minutes: new.duration_minutes,
            shuffle_questions: new.shuffle_questions,
            shuffle_options: new.shuffle_options,
            created_by: new.created_by,
            created_at: Some(Utc::now()),
        };
        state.exams.insert(exam.id, exam.clone());
        state.exam_questions.insert(exam.id, new.question_ids);
        Ok(exam)
    }

    async fn get_exam(&self, id: i64) -> Result<Option<Exam>, AppError> {
        Ok(self.lock()?.exams.get(&id).cloned())
    }

    async fn list_exam_questions(&self, exam_id: i64) -> Result<Vec<ExamQuestion>, AppError> {
        let state = self.lock()?;
        let Some(ids) = state.exam_questions.get(&exam_id) else {
            return Ok(Vec::new());
        };

        Ok(ids
            .iter()
            .enumerate()
            .filter_map(|(position, id)| {
                state.questions.get(id).map(|q| ExamQuestion {
                    position: position as i32,
                    question: q.clone(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl AttemptRepo for InMemoryStore {
    async fn create_attempt_with_answers(
        &self,
        exam_id: i64,
        user_id: i64,
        started_at: DateTime<Utc>,
        question_ids: &[i64],
    ) -> Result<Attempt, AppError> {
        let mut state = self.lock()?;
        if let Some(missing) = question_ids
            .iter()
            .find(|id| !state.questions.contains_key(*id))
        {
            return Err(AppError::InternalServerError(format!(
                "Answer references unknown question {}",
                missing
            )));
        }

        let attempt = Attempt {
            id: state.next_id(),
            exam_id,
            user_id,
            status: AttemptStatus::InProgress,
            started_at,
            submitted_at: None,
            elapsed_seconds: None,
            total_score: None,
        };
        for question_id in question_ids {
            let answer = Answer {
                id: state.next_id(),
                attempt_id: attempt.id,
                question_id: *question_id,
                value: None,
                score: None,
                is_graded: false,
                updated_at: None,
            };
            state.answers.insert(answer.id, answer);
        }
        state.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<Attempt>, AppError> {
        Ok(self.lock()?.attempts.get(&id).cloned())
    }

    async fn find_in_progress(
        &self,
        exam_id: i64,
        user_id: i64,
    ) -> Result<Option<Attempt>, AppError> {
        let state = self.lock()?;
        Ok(state
            .attempts
            .values()
            .filter(|a| {
                a.exam_id == exam_id
                    && a.user_id == user_id
                    && a.status == AttemptStatus::InProgress
            })
            .max_by_key(|a| a.id)
            .cloned())
    }

    async fn update_attempt(&self, attempt: &Attempt) -> Result<(), AppError> {
        let mut state = self.lock()?;
        let stored = state
            .attempts
            .get_mut(&attempt.id)
            .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;
        stored.status = attempt.status;
        stored.submitted_at = attempt.submitted_at;
        stored.elapsed_seconds = attempt.elapsed_seconds;
        stored.total_score = attempt.total_score;
        Ok(())
    }

    async fn list_attempts_for_user(&self, user_id: i64) -> Result<Vec<Attempt>, AppError> {
        let state = self.lock()?;
        let mut attempts: Vec<Attempt> = state
            .attempts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| std::cmp::Reverse(a.id));
        Ok(attempts)
    }
}

#[async_trait]
impl AnswerRepo for InMemoryStore {
    async fn list_answers(&self, attempt_id: i64) -> Result<Vec<Answer>, AppError> {
        let state = self.lock()?;
        let mut answers: Vec<Answer> = state
            .answers
            .values()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.id);
        Ok(answers)
    }

    async fn save_answer_value(
        &self,
        attempt_id: i64,
        question_id: i64,
        value: Option<&AnswerValue>,
    ) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        match state
            .answers
            .values_mut()
            .find(|a| a.attempt_id == attempt_id && a.question_id == question_id)
        {
            Some(answer) => {
                answer.value = value.cloned();
                answer.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_grade(
        &self,
        answer_id: i64,
        score: Option<f64>,
        is_graded: bool,
    ) -> Result<(), AppError> {
        let mut state = self.lock()?;
        let answer = state
            .answers
            .get_mut(&answer_id)
            .ok_or_else(|| AppError::NotFound("Answer not found".to_string()))?;
        answer.score = if is_graded { score } else { None };
        answer.is_graded = is_graded;
        Ok(())
    }
}
