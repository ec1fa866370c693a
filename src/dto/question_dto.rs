use crate::models::question::{Question, QuestionContent, QuestionEdit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1))]
    pub title: String,
    #[serde(alias = "text")]
    pub body: String,
    #[validate(length(min = 1, message = "At least one option is required"))]
    pub options: Vec<String>,
    #[validate(range(min = 0, message = "Correct option must not be negative"))]
    pub correct_option: i32,
}

impl From<CreateQuestionRequest> for QuestionContent {
    fn from(req: CreateQuestionRequest) -> Self {
        QuestionContent {
            title: req.title,
            body: req.body,
            options: req.options,
            correct_option: req.correct_option,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[serde(default, alias = "text", deserialize_with = "trim_optional_string")]
    pub body: Option<String>,
    #[validate(length(min = 1, message = "At least one option is required"))]
    pub options: Option<Vec<String>>,
    #[validate(range(min = 0, message = "Correct option must not be negative"))]
    pub correct_option: Option<i32>,
}

impl From<UpdateQuestionRequest> for QuestionEdit {
    fn from(req: UpdateQuestionRequest) -> Self {
        QuestionEdit {
            body: req.body,
            options: req.options,
            correct_option: req.correct_option,
        }
    }
}

// Trims strings and turns empty ones into None.
fn trim_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub id: i64,
    pub version: i32,
    pub title: String,
    pub body: String,
    pub options: Vec<String>,
    pub correct_option: i32,
    pub author_id: i64,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Question> for QuestionResponse {
    fn from(q: Question) -> Self {
        QuestionResponse {
            id: q.id,
            version: q.version,
            title: q.title,
            body: q.body,
            options: q.options.0,
            correct_option: q.correct_option,
            author_id: q.author_id,
            is_deleted: q.is_deleted,
            created_at: q.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_accepts_legacy_text_field() {
        let req: CreateQuestionRequest = serde_json::from_value(serde_json::json!({
            "title": "Colors",
            "text": "Sky color?",
            "options": ["blue", "green"],
            "correct_option": 0
        }))
        .unwrap();
        assert_eq!(req.body, "Sky color?");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn create_request_rejects_empty_options() {
        let req = CreateQuestionRequest {
            title: "T".into(),
            body: "B".into(),
            options: vec![],
            correct_option: 0,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn update_request_blank_body_means_unchanged() {
        let req: UpdateQuestionRequest =
            serde_json::from_value(serde_json::json!({ "body": "   ", "correct_option": 1 })).unwrap();
        assert_eq!(req.body, None);
        assert_eq!(req.correct_option, Some(1));
        assert!(req.options.is_none());
    }
}
