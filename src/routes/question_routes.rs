use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use validator::Validate;

use crate::{
    dto::question_dto::{CreateQuestionRequest, QuestionResponse, UpdateQuestionRequest},
    error::Result,
    models::identity::{permissions, Identity},
    AppState,
};

fn to_responses(questions: Vec<crate::models::question::Question>) -> Vec<QuestionResponse> {
    questions.into_iter().map(QuestionResponse::from).collect()
}

#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::QUESTION_CREATE)?;
    payload.validate()?;
    let question = state
        .question_service
        .create_question(&identity, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(QuestionResponse::from(question))))
}

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::QUESTION_READ)?;
    let questions = state.question_service.list_questions().await?;
    Ok(Json(to_responses(questions)))
}

#[axum::debug_handler]
pub async fn get_question(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::QUESTION_READ)?;
    let question = state.question_service.get_question(id).await?;
    Ok(Json(QuestionResponse::from(question)))
}

#[axum::debug_handler]
pub async fn update_question(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::QUESTION_UPDATE)?;
    payload.validate()?;
    let question = state
        .question_service
        .update_question(id, payload.into())
        .await?;
    Ok(Json(QuestionResponse::from(question)))
}

#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::QUESTION_DELETE)?;
    state.question_service.delete_question(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn question_history(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::QUESTION_READ)?;
    let versions = state.question_service.question_history(id).await?;
    Ok(Json(to_responses(versions)))
}

#[axum::debug_handler]
pub async fn get_question_version(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((id, version)): Path<(i64, i32)>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::QUESTION_READ)?;
    let question = state
        .question_service
        .get_question_version(id, version)
        .await?;
    Ok(Json(QuestionResponse::from(question)))
}

#[axum::debug_handler]
pub async fn list_course_questions(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::QUESTION_READ)?;
    let questions = state
        .question_service
        .list_course_questions(course_id)
        .await?;
    Ok(Json(to_responses(questions)))
}
