// src/handlers/question.rs

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError, models::question::CreateQuestionRequest, repository::Repositories,
    utils::html::clean_html,
};

/// Creates a question.
/// Admin only. Content is sanitized before it is stored.
pub async fn create_question(
    State(repos): State<Repositories>,
    payload: Result<Json<CreateQuestionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;
    payload.check_shape()?;

    let content = clean_html(&payload.content);
    if content.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Question content is empty after sanitizing".to_string(),
        ));
    }

    let question = repos
        .questions
        .create_question(payload.into_new_question(content))
        .await?;

    tracing::info!("Created {} question {}", question.question_type, question.id);
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": question.id }))))
}

/// Lists every question, answers included.
/// Admin only.
pub async fn list_questions(
    State(repos): State<Repositories>,
) -> Result<impl IntoResponse, AppError> {
    let questions = repos.questions.list_questions().await?;
    Ok(Json(questions))
}

/// Admin only.
pub async fn get_question(
    State(repos): State<Repositories>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = repos
        .questions
        .get_question(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(question))
}
