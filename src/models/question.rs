use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// One row of a question's version chain. Rows are never mutated apart from
/// the `is_deleted` flag, so any `(id, version)` pair stays resolvable.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: i64,
    pub version: i32,
    pub title: String,
    pub body: String,
    pub options: Json<Vec<String>>,
    pub correct_option: i32,
    pub author_id: i64,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Content carried from one version to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionContent {
    pub title: String,
    pub body: String,
    pub options: Vec<String>,
    pub correct_option: i32,
}

/// Partial edit; fields left as `None` keep the live version's value.
#[derive(Debug, Clone, Default)]
pub struct QuestionEdit {
    pub body: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_option: Option<i32>,
}

impl QuestionEdit {
    pub fn apply_to(self, live: &Question) -> QuestionContent {
        QuestionContent {
            title: live.title.clone(),
            body: self.body.unwrap_or_else(|| live.body.clone()),
            options: self.options.unwrap_or_else(|| live.options.0.clone()),
            correct_option: self.correct_option.unwrap_or(live.correct_option),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_question(id: i64, version: i32, options: &[&str], correct: i32) -> Question {
    Question {
        id,
        version,
        title: format!("Question {}", id),
        body: "Pick one".to_string(),
        options: Json(options.iter().map(|o| o.to_string()).collect()),
        correct_option: correct,
        author_id: 1,
        is_deleted: false,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_keeps_title_and_unsupplied_fields() {
        let live = sample_question(4, 2, &["A", "B", "C"], 1);
        let content = QuestionEdit {
            body: Some("New wording".into()),
            options: None,
            correct_option: Some(2),
        }
        .apply_to(&live);

        assert_eq!(content.title, "Question 4");
        assert_eq!(content.body, "New wording");
        assert_eq!(content.options, vec!["A", "B", "C"]);
        assert_eq!(content.correct_option, 2);
    }

    #[test]
    fn empty_edit_reproduces_live_content() {
        let live = sample_question(1, 1, &["yes", "no"], 0);
        let content = QuestionEdit::default().apply_to(&live);
        assert_eq!(content.body, live.body);
        assert_eq!(content.options, live.options.0);
        assert_eq!(content.correct_option, 0);
    }
}
