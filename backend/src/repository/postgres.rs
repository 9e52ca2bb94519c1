// src/repository/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    error::AppError,
    models::{
        answer::{Answer, AnswerValue},
        attempt::Attempt,
        exam::{Exam, ExamQuestion, NewExam},
        question::{NewQuestion, Question, QuestionOption},
    },
    repository::{AnswerRepo, AttemptRepo, ExamRepo, QuestionRepo},
};

/// Postgres-backed implementation of every repository trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw 'questions' row. `type` is a reserved word in Rust.
#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    #[sqlx(rename = "type")]
    question_type: String,
    content: String,
    options: Json<Vec<QuestionOption>>,
    correct_answer: Json<Vec<String>>,
    points: f64,
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            question_type: row.question_type.parse()?,
            content: row.content,
            options: row.options.0,
            correct_answer: row.correct_answer.0,
            points: row.points,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ExamQuestionRow {
    position: i32,
    #[sqlx(flatten)]
    question: QuestionRow,
}

#[derive(FromRow)]
struct AttemptRow {
    id: i64,
    exam_id: i64,
    user_id: i64,
    status: String,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    elapsed_seconds: Option<i64>,
    total_score: Option<f64>,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = AppError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(Attempt {
            id: row.id,
            exam_id: row.exam_id,
            user_id: row.user_id,
            status: row.status.parse()?,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
            elapsed_seconds: row.elapsed_seconds,
            total_score: row.total_score,
        })
    }
}

#[derive(FromRow)]
struct AnswerRow {
    id: i64,
    attempt_id: i64,
    question_id: i64,
    answer_value: Option<Json<AnswerValue>>,
    score: Option<f64>,
    is_graded: bool,
    updated_at: Option<DateTime<Utc>>,
}

impl From<AnswerRow> for Answer {
    fn from(row: AnswerRow) -> Self {
        Answer {
            id: row.id,
            attempt_id: row.attempt_id,
            question_id: row.question_id,
            value: row.answer_value.map(|v| v.0),
            score: row.score,
            is_graded: row.is_graded,
            updated_at: row.updated_at,
        }
    }
}

fn questions_from_rows(rows: Vec<QuestionRow>) -> Result<Vec<Question>, AppError> {
    rows.into_iter().map(Question::try_from).collect()
}

fn attempts_from_rows(rows: Vec<AttemptRow>) -> Result<Vec<Attempt>, AppError> {
    rows.into_iter().map(Attempt::try_from).collect()
}

#[async_trait]
impl QuestionRepo for PgStore {
    async fn create_question(&self, new: NewQuestion) -> Result<Question, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            INSERT INTO questions (type, content, options, correct_answer, points)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, type, content, options, correct_answer, points, created_at
            "#,
        )
        .bind(new.question_type.as_str())
        .bind(&new.content)
        .bind(Json(&new.options))
        .bind(Json(&new.correct_answer))
        .bind(new.points)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert question: {:?}", e);
            AppError::from(e)
        })?;

        Question::try_from(row)
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, type, content, options, correct_answer, points, created_at
            FROM questions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Question::try_from).transpose()
    }

    async fn get_questions(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Dynamic IN clause
        let mut query_builder = QueryBuilder::<Postgres>::new(
            "SELECT id, type, content, options, correct_answer, points, created_at
            FROM questions WHERE id IN (",
        );
        let mut separated = query_builder.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<QuestionRow> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        questions_from_rows(rows)
    }

    async fn list_questions(&self) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, type, content, options, correct_answer, points, created_at
            FROM questions
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        questions_from_rows(rows)
    }
}

#[async_trait]
impl ExamRepo for PgStore {
    async fn create_exam(&self, new: NewExam) -> Result<Exam, AppError> {
        let mut tx = self.pool.begin().await?;

        let exam = sqlx::query_as::<_, Exam>(
            r#"
            INSERT INTO exams
                (title, description, opens_at, closes_at, duration_minutes,
                 shuffle_questions, shuffle_options, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, title, description, opens_at, closes_at, duration_minutes,
                      shuffle_questions, shuffle_options, created_by, created_at
            "#,
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.opens_at)
        .bind(new.closes_at)
        .bind(new.duration_minutes)
        .bind(new.shuffle_questions)
        .bind(new.shuffle_options)
        .bind(new.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert exam: {:?}", e);
            AppError::from(e)
        })?;

        if !new.question_ids.is_empty() {
            let mut query_builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO exam_questions (exam_id, question_id, position) ",
            );
            query_builder.push_values(
                new.question_ids.iter().enumerate(),
                |mut b, (position, question_id)| {
                    b.push_bind(exam.id)
                        .push_bind(*question_id)
                        .push_bind(position as i32);
                },
            );
            query_builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(exam)
    }

    async fn get_exam(&self, id: i64) -> Result<Option<Exam>, AppError> {
        let exam = sqlx::query_as::<_, Exam>(
            r#"
            SELECT id, title, description, opens_at, closes_at, duration_minutes,
                   shuffle_questions, shuffle_options, created_by, created_at
            FROM exams
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(exam)
    }

    async fn list_exam_questions(&self, exam_id: i64) -> Result<Vec<ExamQuestion>, AppError> {
        let rows = sqlx::query_as::<_, ExamQuestionRow>(
            r#"
            SELECT
                eq.position,
                q.id, q.type, q.content, q.options, q.correct_answer, q.points, q.created_at
            FROM exam_questions eq
            JOIN questions q ON q.id = eq.question_id
            WHERE eq.exam_id = $1
            ORDER BY eq.position
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ExamQuestion {
                    position: row.position,
                    question: Question::try_from(row.question)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl AttemptRepo for PgStore {
    async fn create_attempt_with_answers(
        &self,
        exam_id: i64,
        user_id: i64,
        started_at: DateTime<Utc>,
        question_ids: &[i64],
    ) -> Result<Attempt, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AttemptRow>(
            r#"
            INSERT INTO attempts (exam_id, user_id, status, started_at)
            VALUES ($1, $2, 'in_progress', $3)
            RETURNING id, exam_id, user_id, status, started_at, submitted_at,
                      elapsed_seconds, total_score
            "#,
        )
        .bind(exam_id)
        .bind(user_id)
        .bind(started_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert attempt: {:?}", e);
            AppError::from(e)
        })?;

        if !question_ids.is_empty() {
            let attempt_id = row.id;
            let mut query_builder =
                QueryBuilder::<Postgres>::new("INSERT INTO answers (attempt_id, question_id) ");
            query_builder.push_values(question_ids, |mut b, question_id| {
                b.push_bind(attempt_id).push_bind(*question_id);
            });

            query_builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create answers for attempt {}: {:?}", attempt_id, e);
                    AppError::from(e)
                })?;
        }

        tx.commit().await?;

        Attempt::try_from(row)
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<Attempt>, AppError> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT id, exam_id, user_id, status, started_at, submitted_at,
                   elapsed_seconds, total_score
            FROM attempts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn find_in_progress(
        &self,
        exam_id: i64,
        user_id: i64,
    ) -> Result<Option<Attempt>, AppError> {
        let row = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT id, exam_id, user_id, status, started_at, submitted_at,
                   elapsed_seconds, total_score
            FROM attempts
            WHERE exam_id = $1 AND user_id = $2 AND status = 'in_progress'
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(exam_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn update_attempt(&self, attempt: &Attempt) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE attempts
            SET status = $2, submitted_at = $3, elapsed_seconds = $4, total_score = $5
            WHERE id = $1
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.status.as_str())
        .bind(attempt.submitted_at)
        .bind(attempt.elapsed_seconds)
        .bind(attempt.total_score)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Attempt not found".to_string()));
        }
        Ok(())
    }

    async fn list_attempts_for_user(&self, user_id: i64) -> Result<Vec<Attempt>, AppError> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            r#"
            SELECT id, exam_id, user_id, status, started_at, submitted_at,
                   elapsed_seconds, total_score
            FROM attempts
            WHERE user_id = $1
            ORDER BY id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        attempts_from_rows(rows)
    }
}

#[async_trait]
impl AnswerRepo for PgStore {
    async fn list_answers(&self, attempt_id: i64) -> Result<Vec<Answer>, AppError> {
        let rows = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT id, attempt_id, question_id, answer_value, score, is_graded, updated_at
            FROM answers
            WHERE attempt_id = $1
            ORDER BY id
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Answer::from).collect())
    }

    async fn save_answer_value(
        &self,
        attempt_id: i64,
        question_id: i64,
        value: Option<&AnswerValue>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE answers
            SET answer_value = $3, updated_at = NOW()
            WHERE attempt_id = $1 AND question_id = $2
            "#,
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(value.map(Json))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_grade(
        &self,
        answer_id: i64,
        score: Option<f64>,
        is_graded: bool,
    ) -> Result<(), AppError> {
        let score = if is_graded { score } else { None };

        sqlx::query("UPDATE answers SET score = $2, is_graded = $3 WHERE id = $1")
            .bind(answer_id)
            .bind(score)
            .bind(is_graded)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
