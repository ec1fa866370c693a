use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::{
    dto::attempt_dto::{
        AnswerResponse, AttemptDetailResponse, AttemptResponse, AttemptResultResponse,
        SubmitAnswerRequest,
    },
    error::Result,
    models::identity::Identity,
    AppState,
};

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let attempt = state
        .attempt_service
        .start_attempt(&identity, test_id)
        .await?;
    Ok((StatusCode::CREATED, Json(AttemptResponse::from(attempt))))
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let view = state.attempt_service.get_attempt(&identity, id).await?;
    Ok(Json(AttemptDetailResponse::from(view)))
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((id, question_id)): Path<(i64, i64)>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse> {
    let answer = state
        .attempt_service
        .submit_answer(&identity, id, question_id, payload.selected_option)
        .await?;
    Ok(Json(AnswerResponse::from(answer)))
}

#[axum::debug_handler]
pub async fn finish_attempt(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let result = state.attempt_service.finish_attempt(&identity, id).await?;
    Ok(Json(AttemptResultResponse::from(result)))
}

#[axum::debug_handler]
pub async fn attempt_score(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let result = state.attempt_service.recompute_score(&identity, id).await?;
    Ok(Json(AttemptResultResponse::from(result)))
}
