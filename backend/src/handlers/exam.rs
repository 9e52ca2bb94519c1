// src/handlers/exam.rs

use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        exam::{CreateExamRequest, ExamView},
        question::PublicQuestion,
    },
    repository::Repositories,
    utils::jwt::Claims,
};

/// Creates an exam from an ordered list of existing question ids.
/// Admin only.
pub async fn create_exam(
    State(repos): State<Repositories>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateExamRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;
    payload.check_shape()?;

    let found: HashSet<i64> = repos
        .questions
        .get_questions(&payload.question_ids)
        .await?
        .into_iter()
        .map(|q| q.id)
        .collect();
    if let Some(missing) = payload.question_ids.iter().find(|id| !found.contains(*id)) {
        return Err(AppError::BadRequest(format!(
            "Question {} does not exist",
            missing
        )));
    }

    let exam = repos
        .exams
        .create_exam(payload.into_new_exam(claims.user_id()?))
        .await?;

    tracing::info!("Created exam {} '{}'", exam.id, exam.title);
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": exam.id }))))
}

/// Public exam view: settings plus questions in order, without answers.
pub async fn get_exam(
    State(repos): State<Repositories>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = repos
        .exams
        .get_exam(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    let questions: Vec<PublicQuestion> = repos
        .exams
        .list_exam_questions(exam.id)
        .await?
        .iter()
        .map(|eq| PublicQuestion::from(&eq.question))
        .collect();

    Ok(Json(ExamView { exam, questions }))
}
