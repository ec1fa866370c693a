use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Selected option of an answer row nobody has submitted yet.
pub const UNANSWERED: i32 = -1;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Answer {
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_option: i32,
    pub answered_at: Option<DateTime<Utc>>,
}

impl Answer {
    pub fn is_answered(&self) -> bool {
        self.selected_option != UNANSWERED
    }
}
