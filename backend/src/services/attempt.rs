// src/services/attempt.rs

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use crate::{
    config::StartPolicy,
    error::AppError,
    models::{
        answer::{Answer, AnswerValue},
        attempt::{Attempt, AttemptResult, AttemptResultItem, AttemptStatus, AutosaveEntry},
        question::{PublicQuestion, Question},
    },
    repository::Repositories,
    services::grading::grade,
};

/// Attempt lifecycle: start, autosave, submit, read back, abandon.
#[derive(Clone)]
pub struct AttemptService {
    repos: Repositories,
    start_policy: StartPolicy,
}

impl AttemptService {
    pub fn new(repos: Repositories, start_policy: StartPolicy) -> Self {
        Self {
            repos,
            start_policy,
        }
    }

    /// Opens an attempt on `exam_id` with one empty answer per exam question.
    ///
    /// Under `StartPolicy::ResumeInProgress` an existing in-progress attempt
    /// of the same user is returned instead.
    pub async fn start(&self, exam_id: i64, user_id: i64) -> Result<i64, AppError> {
        let exam = self
            .repos
            .exams
            .get_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

        if self.start_policy == StartPolicy::ResumeInProgress {
            if let Some(existing) = self.repos.attempts.find_in_progress(exam.id, user_id).await? {
                tracing::info!(
                    "Resuming attempt {} for user {} on exam {}",
                    existing.id,
                    user_id,
                    exam.id
                );
                return Ok(existing.id);
            }
        }

        let question_ids: Vec<i64> = self
            .repos
            .exams
            .list_exam_questions(exam.id)
            .await?
            .into_iter()
            .map(|eq| eq.question.id)
            .collect();

        let attempt = self
            .repos
            .attempts
            .create_attempt_with_answers(exam.id, user_id, Utc::now(), &question_ids)
            .await?;

        tracing::info!(
            "Started attempt {} for user {} on exam {} ({} questions)",
            attempt.id,
            user_id,
            exam.id,
            question_ids.len()
        );
        Ok(attempt.id)
    }

    /// Stores in-progress answer values.
    ///
    /// Entries for questions outside the attempt are skipped. Every remaining
    /// value is validated against its question type before anything is
    /// written; each write is then an independent update keyed by
    /// (attempt, question). Returns the number of answers written.
    pub async fn autosave(
        &self,
        attempt_id: i64,
        user_id: i64,
        entries: Vec<AutosaveEntry>,
    ) -> Result<usize, AppError> {
        let attempt = self.load_owned(attempt_id, user_id).await?;
        let answers = self.repos.answers.list_answers(attempt.id).await?;
        let questions = self.questions_for(&answers).await?;

        let mut staged: Vec<(i64, Option<AnswerValue>)> = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(question) = questions.get(&entry.question_id) else {
                tracing::debug!(
                    "Ignoring autosave entry for question {} outside attempt {}",
                    entry.question_id,
                    attempt.id
                );
                continue;
            };
            let value = AnswerValue::from_json(question, &entry.answer)?;
            staged.push((entry.question_id, value));
        }

        let mut written = 0;
        for (question_id, value) in &staged {
            if self
                .repos
                .answers
                .save_answer_value(attempt.id, *question_id, value.as_ref())
                .await?
            {
                written += 1;
            }
        }

        tracing::debug!("Autosaved {} answers on attempt {}", written, attempt.id);
        Ok(written)
    }

    /// Grades auto-gradable answers and closes the attempt. Returns the total score.
    ///
    /// Submitting again re-grades with the current values and overwrites the total.
    pub async fn submit(&self, attempt_id: i64, user_id: i64) -> Result<f64, AppError> {
        let mut attempt = self.load_owned(attempt_id, user_id).await?;
        if attempt.status == AttemptStatus::Abandoned {
            return Err(AppError::Conflict(
                "Abandoned attempts cannot be submitted".to_string(),
            ));
        }

        let answers = self.repos.answers.list_answers(attempt.id).await?;
        let questions = self.questions_for(&answers).await?;

        let mut total = 0.0;
        let mut all_graded = true;
        for answer in &answers {
            let question = questions.get(&answer.question_id).ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "Question {} of attempt {} is missing",
                    answer.question_id, attempt.id
                ))
            })?;

            match grade(question, answer.value.as_ref()) {
                Some(score) => {
                    self.repos
                        .answers
                        .record_grade(answer.id, Some(score), true)
                        .await?;
                    total += score;
                }
                // Left for a human grader; an existing manual grade still counts.
                None if answer.is_graded => total += answer.score.unwrap_or(0.0),
                None => all_graded = false,
            }
        }

        let now = Utc::now();
        attempt.submitted_at = Some(now);
        attempt.elapsed_seconds = Some((now - attempt.started_at).num_seconds().max(0));
        attempt.total_score = Some(total);
        attempt.status = if all_graded {
            AttemptStatus::Graded
        } else {
            AttemptStatus::Submitted
        };
        self.repos.attempts.update_attempt(&attempt).await?;

        tracing::info!(
            "Attempt {} submitted by user {}: total {} ({})",
            attempt.id,
            user_id,
            total,
            attempt.status
        );
        Ok(total)
    }

    /// Attempt plus every exam question with the stored answer, in exam order.
    /// Correct answers are included only once the attempt is closed.
    pub async fn get_result(&self, attempt_id: i64, user_id: i64) -> Result<AttemptResult, AppError> {
        let attempt = self.load_owned(attempt_id, user_id).await?;
        let exam_questions = self.repos.exams.list_exam_questions(attempt.exam_id).await?;
        let answers: HashMap<i64, Answer> = self
            .repos
            .answers
            .list_answers(attempt.id)
            .await?
            .into_iter()
            .map(|a| (a.question_id, a))
            .collect();

        let reveal = attempt.status != AttemptStatus::InProgress;
        let items = exam_questions
            .into_iter()
            .filter_map(|eq| {
                let answer = answers.get(&eq.question.id)?;
                Some(AttemptResultItem {
                    position: eq.position,
                    question: PublicQuestion::from(&eq.question),
                    answer: answer.value.clone(),
                    score: if answer.is_graded { answer.score } else { None },
                    is_graded: answer.is_graded,
                    correct_answer: reveal.then(|| eq.question.correct_answer.clone()),
                })
            })
            .collect();

        Ok(AttemptResult { attempt, items })
    }

    /// Marks an in-progress attempt as abandoned.
    pub async fn abandon(&self, attempt_id: i64, user_id: i64) -> Result<(), AppError> {
        let mut attempt = self.load_owned(attempt_id, user_id).await?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(AppError::Conflict(format!(
                "Attempt is already {}",
                attempt.status
            )));
        }

        attempt.status = AttemptStatus::Abandoned;
        self.repos.attempts.update_attempt(&attempt).await?;
        tracing::info!("Attempt {} abandoned by user {}", attempt.id, user_id);
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Attempt>, AppError> {
        self.repos.attempts.list_attempts_for_user(user_id).await
    }

    async fn load_owned(&self, attempt_id: i64, user_id: i64) -> Result<Attempt, AppError> {
        let attempt = self
            .repos
            .attempts
            .get_attempt(attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

        if attempt.user_id != user_id {
            return Err(AppError::Forbidden(
                "Attempt belongs to another user".to_string(),
            ));
        }
        Ok(attempt)
    }

    async fn questions_for(&self, answers: &[Answer]) -> Result<HashMap<i64, Question>, AppError> {
        let ids: Vec<i64> = answers
            .iter()
            .map(|a| a.question_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        Ok(self
            .repos
            .questions
            .get_questions(&ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            exam::NewExam,
            question::{NewQuestion, QuestionOption, QuestionType},
        },
        repository::InMemoryStore,
    };
    use serde_json::json;

    const USER: i64 = 42;

    struct Fixture {
        service: AttemptService,
        repos: Repositories,
        exam_id: i64,
        q1: i64,
        q2: i64,
    }

    fn options(keys: &[&str]) -> Vec<QuestionOption> {
        keys.iter()
            .map(|k| QuestionOption {
                key: k.to_string(),
                label: format!("Option {}", k),
            })
            .collect()
    }

    /// Q1: multiple choice, correct {A, B}, 2 points. Q2: short text, 1 point.
    async fn fixture(policy: StartPolicy) -> Fixture {
        let repos = Repositories::from_store(InMemoryStore::new());

        let q1 = repos
            .questions
            .create_question(NewQuestion {
                question_type: QuestionType::MultipleChoice,
                content: "Which joints use no nails?".to_string(),
                options: options(&["A", "B", "C"]),
                correct_answer: vec!["A".to_string(), "B".to_string()],
                points: 2.0,
            })
            .await
            .unwrap();
        let q2 = repos
            .questions
            .create_question(NewQuestion {
                question_type: QuestionType::ShortText,
                content: "Name a bracket set.".to_string(),
                options: Vec::new(),
                correct_answer: Vec::new(),
                points: 1.0,
            })
            .await
            .unwrap();
        let exam = repos
            .exams
            .create_exam(NewExam {
                title: "Joinery".to_string(),
                description: None,
                opens_at: None,
                closes_at: None,
                duration_minutes: None,
                shuffle_questions: false,
                shuffle_options: false,
                created_by: 1,
                question_ids: vec![q1.id, q2.id],
            })
            .await
            .unwrap();

        Fixture {
            service: AttemptService::new(repos.clone(), policy),
            repos,
            exam_id: exam.id,
            q1: q1.id,
            q2: q2.id,
        }
    }

    fn entry(question_id: i64, answer: serde_json::Value) -> AutosaveEntry {
        AutosaveEntry {
            question_id,
            answer,
        }
    }

    #[tokio::test]
    async fn start_creates_one_empty_answer_per_question() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let attempt_id = f.service.start(f.exam_id, USER).await.unwrap();

        let answers = f.repos.answers.list_answers(attempt_id).await.unwrap();
        assert_eq!(answers.len(), 2);
        let ids: HashSet<i64> = answers.iter().map(|a| a.question_id).collect();
        assert_eq!(ids, HashSet::from([f.q1, f.q2]));
        assert!(answers.iter().all(|a| a.value.is_none() && !a.is_graded && a.score.is_none()));

        let attempt = f.repos.attempts.get_attempt(attempt_id).await.unwrap().unwrap();
        assert_eq!(attempt.status, AttemptStatus::InProgress);
        assert_eq!(attempt.user_id, USER);
    }

    #[tokio::test]
    async fn failed_answer_insert_leaves_no_attempt() {
        let f = fixture(StartPolicy::ResumeInProgress).await;

        let err = f
            .repos
            .attempts
            .create_attempt_with_answers(f.exam_id, USER, Utc::now(), &[f.q1, 404_404])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InternalServerError(_)));
        assert!(f.repos.attempts.list_attempts_for_user(USER).await.unwrap().is_empty());
        assert!(f.repos.attempts.find_in_progress(f.exam_id, USER).await.unwrap().is_none());

        let attempt_id = f.service.start(f.exam_id, USER).await.unwrap();
        assert_eq!(f.repos.answers.list_answers(attempt_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn start_unknown_exam_is_not_found() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let err = f.service.start(9999, USER).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn start_policy_controls_reuse() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let a = f.service.start(f.exam_id, USER).await.unwrap();
        let b = f.service.start(f.exam_id, USER).await.unwrap();
        assert_ne!(a, b);

        let f = fixture(StartPolicy::ResumeInProgress).await;
        let a = f.service.start(f.exam_id, USER).await.unwrap();
        let b = f.service.start(f.exam_id, USER).await.unwrap();
        assert_eq!(a, b);

        f.service.submit(a, USER).await.unwrap();
        let c = f.service.start(f.exam_id, USER).await.unwrap();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn autosave_is_idempotent_and_skips_unknown_questions() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let attempt_id = f.service.start(f.exam_id, USER).await.unwrap();

        let payload = || vec![entry(f.q1, json!(["B", "A"])), entry(777, json!("ignored"))];
        assert_eq!(f.service.autosave(attempt_id, USER, payload()).await.unwrap(), 1);
        let once = f.repos.answers.list_answers(attempt_id).await.unwrap();
        f.service.autosave(attempt_id, USER, payload()).await.unwrap();
        let twice = f.repos.answers.list_answers(attempt_id).await.unwrap();

        let value = |answers: &[Answer]| {
            answers
                .iter()
                .find(|a| a.question_id == f.q1)
                .and_then(|a| a.value.clone())
        };
        assert_eq!(value(once.as_slice()), value(twice.as_slice()));
        assert_eq!(
            value(twice.as_slice()),
            Some(AnswerValue::MultipleChoice(
                ["A".to_string(), "B".to_string()].into_iter().collect()
            ))
        );
    }

    #[tokio::test]
    async fn autosave_rejects_bad_shape_without_writing() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let attempt_id = f.service.start(f.exam_id, USER).await.unwrap();

        let err = f
            .service
            .autosave(
                attempt_id,
                USER,
                vec![entry(f.q2, json!("fine")), entry(f.q1, json!("not-a-list"))],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let answers = f.repos.answers.list_answers(attempt_id).await.unwrap();
        assert!(answers.iter().all(|a| a.value.is_none()));
    }

    #[tokio::test]
    async fn autosave_unknown_attempt_is_not_found() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let err = f.service.autosave(555, USER, Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn end_to_end_grades_only_choice_questions() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let attempt_id = f.service.start(f.exam_id, USER).await.unwrap();
        f.service
            .autosave(
                attempt_id,
                USER,
                vec![entry(f.q1, json!(["A", "B"])), entry(f.q2, json!("answer text"))],
            )
            .await
            .unwrap();

        let total = f.service.submit(attempt_id, USER).await.unwrap();
        assert_eq!(total, 2.0);

        let answers = f.repos.answers.list_answers(attempt_id).await.unwrap();
        let q1 = answers.iter().find(|a| a.question_id == f.q1).unwrap();
        let q2 = answers.iter().find(|a| a.question_id == f.q2).unwrap();
        assert!(q1.is_graded);
        assert_eq!(q1.score, Some(2.0));
        assert!(!q2.is_graded);
        assert_eq!(q2.score, None);

        let attempt = f.repos.attempts.get_attempt(attempt_id).await.unwrap().unwrap();
        assert_eq!(attempt.status, AttemptStatus::Submitted);
        assert_eq!(attempt.total_score, Some(2.0));
        assert!(attempt.submitted_at.is_some());
        assert!(attempt.elapsed_seconds.is_some());
    }

    #[tokio::test]
    async fn resubmit_recomputes_with_current_values() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let attempt_id = f.service.start(f.exam_id, USER).await.unwrap();
        f.service
            .autosave(attempt_id, USER, vec![entry(f.q1, json!(["A", "B"]))])
            .await
            .unwrap();
        assert_eq!(f.service.submit(attempt_id, USER).await.unwrap(), 2.0);

        f.service
            .autosave(attempt_id, USER, vec![entry(f.q1, json!(["A"]))])
            .await
            .unwrap();
        assert_eq!(f.service.submit(attempt_id, USER).await.unwrap(), 0.0);

        let attempt = f.repos.attempts.get_attempt(attempt_id).await.unwrap().unwrap();
        assert_eq!(attempt.total_score, Some(0.0));
    }

    #[tokio::test]
    async fn manual_grade_counts_towards_total() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let attempt_id = f.service.start(f.exam_id, USER).await.unwrap();
        f.service
            .autosave(
                attempt_id,
                USER,
                vec![entry(f.q1, json!(["A", "B"])), entry(f.q2, json!("Dougong"))],
            )
            .await
            .unwrap();
        assert_eq!(f.service.submit(attempt_id, USER).await.unwrap(), 2.0);

        let answers = f.repos.answers.list_answers(attempt_id).await.unwrap();
        let text = answers.iter().find(|a| a.question_id == f.q2).unwrap();
        f.repos
            .answers
            .record_grade(text.id, Some(0.5), true)
            .await
            .unwrap();

        assert_eq!(f.service.submit(attempt_id, USER).await.unwrap(), 2.5);
        let attempt = f.repos.attempts.get_attempt(attempt_id).await.unwrap().unwrap();
        assert_eq!(attempt.status, AttemptStatus::Graded);
        assert_eq!(attempt.total_score, Some(2.5));
    }

    #[tokio::test]
    async fn other_users_are_forbidden() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let attempt_id = f.service.start(f.exam_id, USER).await.unwrap();

        assert!(matches!(
            f.service.submit(attempt_id, USER + 1).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            f.service.get_result(attempt_id, USER + 1).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn result_hides_correct_answers_until_submitted() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let attempt_id = f.service.start(f.exam_id, USER).await.unwrap();

        let before = f.service.get_result(attempt_id, USER).await.unwrap();
        assert_eq!(before.items.len(), 2);
        assert_eq!(before.items[0].question.id, f.q1);
        assert!(before.items.iter().all(|i| i.correct_answer.is_none()));

        f.service.submit(attempt_id, USER).await.unwrap();
        let after = f.service.get_result(attempt_id, USER).await.unwrap();
        assert_eq!(
            after.items[0].correct_answer,
            Some(vec!["A".to_string(), "B".to_string()])
        );
        assert_eq!(after.items[0].score, Some(0.0));
    }

    #[tokio::test]
    async fn abandon_only_from_in_progress() {
        let f = fixture(StartPolicy::AlwaysNew).await;
        let attempt_id = f.service.start(f.exam_id, USER).await.unwrap();
        f.service.abandon(attempt_id, USER).await.unwrap();

        assert!(matches!(
            f.service.abandon(attempt_id, USER).await.unwrap_err(),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            f.service.submit(attempt_id, USER).await.unwrap_err(),
            AppError::Conflict(_)
        ));
    }
}
