// tests/pg_store_tests.rs
//
// Runs the attempt lifecycle against Postgres. Skipped when DATABASE_URL is not set.

use exam_backend::{
    config::StartPolicy,
    models::{
        attempt::{AttemptStatus, AutosaveEntry},
        exam::NewExam,
        question::{NewQuestion, QuestionOption, QuestionType},
    },
    repository::{PgStore, Repositories},
    services::AttemptService,
};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;

async fn pg_repos() -> Option<Repositories> {
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    Some(Repositories::from_store(PgStore::new(pool)))
}

#[tokio::test]
async fn test_lifecycle_on_postgres() {
    let Some(repos) = pg_repos().await else {
        eprintln!("DATABASE_URL not set, skipping Postgres test");
        return;
    };

    let q1 = repos
        .questions
        .create_question(NewQuestion {
            question_type: QuestionType::MultipleChoice,
            content: "Which are roof styles?".to_string(),
            options: ["A", "B", "C"]
                .iter()
                .map(|k| QuestionOption {
                    key: k.to_string(),
                    label: format!("Style {}", k),
                })
                .collect(),
            correct_answer: vec!["A".to_string(), "B".to_string()],
            points: 2.0,
        })
        .await
        .unwrap();
    let q2 = repos
        .questions
        .create_question(NewQuestion {
            question_type: QuestionType::Essay,
            content: "Describe a dougong.".to_string(),
            options: Vec::new(),
            correct_answer: Vec::new(),
            points: 5.0,
        })
        .await
        .unwrap();

    let exam = repos
        .exams
        .create_exam(NewExam {
            title: "Roofs".to_string(),
            description: Some("Integration".to_string()),
            opens_at: None,
            closes_at: None,
            duration_minutes: Some(15),
            shuffle_questions: false,
            shuffle_options: false,
            created_by: 1,
            question_ids: vec![q1.id, q2.id],
        })
        .await
        .unwrap();

    let ordered = repos.exams.list_exam_questions(exam.id).await.unwrap();
    assert_eq!(
        ordered.iter().map(|eq| eq.question.id).collect::<Vec<_>>(),
        vec![q1.id, q2.id]
    );

    let service = AttemptService::new(repos.clone(), StartPolicy::AlwaysNew);
    let user_id = 90_000 + exam.id;
    let attempt_id = service.start(exam.id, user_id).await.unwrap();

    service
        .autosave(
            attempt_id,
            user_id,
            vec![
                AutosaveEntry {
                    question_id: q1.id,
                    answer: serde_json::json!(["A", "B"]),
                },
                AutosaveEntry {
                    question_id: q2.id,
                    answer: serde_json::json!("Interlocking brackets."),
                },
            ],
        )
        .await
        .unwrap();

    let total = service.submit(attempt_id, user_id).await.unwrap();
    assert_eq!(total, 2.0);

    let attempt = repos.attempts.get_attempt(attempt_id).await.unwrap().unwrap();
    assert_eq!(attempt.status, AttemptStatus::Submitted);
    assert_eq!(attempt.total_score, Some(2.0));

    let answers = repos.answers.list_answers(attempt_id).await.unwrap();
    let essay = answers.iter().find(|a| a.question_id == q2.id).unwrap();
    assert!(!essay.is_graded);
    assert_eq!(essay.score, None);
}

#[tokio::test]
async fn test_start_is_atomic_on_postgres() {
    let Some(repos) = pg_repos().await else {
        eprintln!("DATABASE_URL not set, skipping Postgres test");
        return;
    };

    let question = repos
        .questions
        .create_question(NewQuestion {
            question_type: QuestionType::SingleChoice,
            content: "Which dynasty built the Forbidden City?".to_string(),
            options: ["A", "B"]
                .iter()
                .map(|k| QuestionOption {
                    key: k.to_string(),
                    label: format!("Dynasty {}", k),
                })
                .collect(),
            correct_answer: vec!["A".to_string()],
            points: 1.0,
        })
        .await
        .unwrap();

    let exam = repos
        .exams
        .create_exam(NewExam {
            title: "Palaces".to_string(),
            description: None,
            opens_at: None,
            closes_at: None,
            duration_minutes: None,
            shuffle_questions: false,
            shuffle_options: false,
            created_by: 1,
            question_ids: vec![question.id],
        })
        .await
        .unwrap();

    let user_id = 80_000 + exam.id;

    // The answers insert violates the question foreign key; the attempt row must roll back with it.
    let result = repos
        .attempts
        .create_attempt_with_answers(exam.id, user_id, Utc::now(), &[question.id, i64::MAX])
        .await;
    assert!(result.is_err());
    assert!(
        repos
            .attempts
            .list_attempts_for_user(user_id)
            .await
            .unwrap()
            .is_empty()
    );

    let service = AttemptService::new(repos.clone(), StartPolicy::ResumeInProgress);
    let attempt_id = service.start(exam.id, user_id).await.unwrap();
    let answers = repos.answers.list_answers(attempt_id).await.unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].question_id, question.id);
    assert!(answers[0].value.is_none());
}
