use crate::dto::question_dto::QuestionResponse;
use crate::models::test::Test;
use crate::services::test_service::{StatusChange, TestWithQuestions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTestRequest {
    pub course_id: i64,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub question_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RenameTestRequest {
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetTestStatusRequest {
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddQuestionRequest {
    pub question_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceQuestionsRequest {
    pub question_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResponse {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
    pub question_ids: Vec<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Test> for TestResponse {
    fn from(t: Test) -> Self {
        TestResponse {
            id: t.id,
            course_id: t.course_id,
            name: t.name,
            question_ids: t.question_ids,
            is_active: t.is_active,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestDetailResponse {
    #[serde(flatten)]
    pub test: TestResponse,
    pub questions: Vec<QuestionResponse>,
    pub unavailable_question_ids: Vec<i64>,
}

impl From<TestWithQuestions> for TestDetailResponse {
    fn from(t: TestWithQuestions) -> Self {
        TestDetailResponse {
            test: t.test.into(),
            questions: t.questions.into_iter().map(Into::into).collect(),
            unavailable_question_ids: t.unavailable_question_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeResponse {
    pub test: TestResponse,
    pub finished_attempts: usize,
}

impl From<StatusChange> for StatusChangeResponse {
    fn from(change: StatusChange) -> Self {
        StatusChangeResponse {
            test: change.test.into(),
            finished_attempts: change.finished_attempts,
        }
    }
}
