// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::attempt::{AutosaveRequest, StartResponse, SubmitResponse},
    services::AttemptService,
    utils::jwt::Claims,
};

/// Starts an attempt on an exam for the calling user.
///
/// Returns `{ "attemptId": ... }`.
pub async fn start_attempt(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt_id = service.start(exam_id, claims.user_id()?).await?;
    Ok(Json(StartResponse { attempt_id }))
}

/// Periodic save of in-progress answers.
///
/// Unknown question ids are ignored; a malformed answer rejects the whole batch.
pub async fn autosave(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    payload: Result<Json<AutosaveRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    service
        .autosave(attempt_id, claims.user_id()?, payload.answers)
        .await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Submits the attempt and grades choice questions.
pub async fn submit_attempt(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let total = service.submit(attempt_id, claims.user_id()?).await?;
    Ok(Json(SubmitResponse { ok: true, total }))
}

/// Full attempt projection: attempt row plus answers and questions in exam order.
pub async fn get_attempt(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = service.get_result(attempt_id, claims.user_id()?).await?;
    Ok(Json(result))
}

pub async fn abandon_attempt(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    service.abandon(attempt_id, claims.user_id()?).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Lists the caller's attempts, newest first.
pub async fn list_my_attempts(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = service.list_for_user(claims.user_id()?).await?;
    Ok(Json(attempts))
}
