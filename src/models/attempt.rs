use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Frozen snapshot: question id -> version captured when the attempt started.
pub type QuestionVersions = BTreeMap<i64, i32>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attempt {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    pub question_versions: Json<QuestionVersions>,
    pub is_finished: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub score: Option<Decimal>,
}

impl Attempt {
    pub fn frozen_version(&self, question_id: i64) -> Option<i32> {
        self.question_versions.0.get(&question_id).copied()
    }

    pub fn frozen_question_count(&self) -> usize {
        self.question_versions.0.len()
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}
