use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use validator::Validate;

use crate::{
    dto::{
        attempt_dto::AttemptResponse,
        test_dto::{
            AddQuestionRequest, CreateTestRequest, RenameTestRequest, ReplaceQuestionsRequest,
            SetTestStatusRequest, StatusChangeResponse, TestDetailResponse, TestResponse,
        },
    },
    error::Result,
    models::identity::{permissions, Identity},
    AppState,
};

#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::TEST_ADD)?;
    payload.validate()?;
    let test = state
        .test_service
        .create_test(payload.course_id, &payload.name, &payload.question_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(TestResponse::from(test))))
}

#[axum::debug_handler]
pub async fn get_test(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::TEST_READ)?;
    let test = state.test_service.get_test_with_questions(id).await?;
    Ok(Json(TestDetailResponse::from(test)))
}

#[axum::debug_handler]
pub async fn list_course_tests(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::TEST_READ)?;
    let tests = state.test_service.list_course_tests(course_id).await?;
    Ok(Json(
        tests.into_iter().map(TestResponse::from).collect::<Vec<_>>(),
    ))
}

#[axum::debug_handler]
pub async fn rename_test(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<RenameTestRequest>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::TEST_WRITE)?;
    payload.validate()?;
    let test = state.test_service.rename_test(id, &payload.name).await?;
    Ok(Json(TestResponse::from(test)))
}

#[axum::debug_handler]
pub async fn delete_test(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::TEST_DELETE)?;
    let change = state.test_service.delete_test(id).await?;
    Ok(Json(StatusChangeResponse::from(change)))
}

#[axum::debug_handler]
pub async fn set_test_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<SetTestStatusRequest>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::TEST_WRITE)?;
    let change = state.test_service.set_test_status(id, payload.active).await?;
    Ok(Json(StatusChangeResponse::from(change)))
}

#[axum::debug_handler]
pub async fn replace_questions(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<ReplaceQuestionsRequest>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::TEST_WRITE)?;
    let test = state
        .test_service
        .replace_questions(id, &payload.question_ids)
        .await?;
    Ok(Json(TestResponse::from(test)))
}

#[axum::debug_handler]
pub async fn add_question(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    Json(payload): Json<AddQuestionRequest>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::TEST_WRITE)?;
    let test = state
        .test_service
        .add_question_to_test(id, payload.question_id)
        .await?;
    Ok(Json(TestResponse::from(test)))
}

#[axum::debug_handler]
pub async fn remove_question(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((id, question_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::TEST_WRITE)?;
    let test = state
        .test_service
        .remove_question_from_test(id, question_id)
        .await?;
    Ok(Json(TestResponse::from(test)))
}

#[axum::debug_handler]
pub async fn list_test_attempts(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    identity.require(permissions::TEST_ATTEMPTS_READ)?;
    let attempts = state.test_service.list_test_attempts(id).await?;
    Ok(Json(
        attempts
            .into_iter()
            .map(AttemptResponse::from)
            .collect::<Vec<_>>(),
    ))
}
