use crate::models::answer::Answer;
use crate::models::attempt::{Attempt, QuestionVersions};
use crate::models::question::Question;
use crate::services::attempt_service::{AttemptResult, AttemptView};
use crate::services::grading_service::GradedAnswer;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAnswerRequest {
    #[serde(alias = "option")]
    pub selected_option: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResponse {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    pub question_versions: QuestionVersions,
    pub is_finished: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
}

impl From<Attempt> for AttemptResponse {
    fn from(a: Attempt) -> Self {
        AttemptResponse {
            id: a.id,
            user_id: a.user_id,
            test_id: a.test_id,
            question_versions: a.question_versions.0,
            is_finished: a.is_finished,
            started_at: a.started_at,
            finished_at: a.finished_at,
            score: a.score.and_then(|s| s.to_f64()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub question_id: i64,
    pub selected_option: i32,
    pub answered: bool,
    pub answered_at: Option<DateTime<Utc>>,
}

impl From<Answer> for AnswerResponse {
    fn from(a: Answer) -> Self {
        AnswerResponse {
            question_id: a.question_id,
            answered: a.is_answered(),
            selected_option: a.selected_option,
            answered_at: a.answered_at,
        }
    }
}

/// Question as shown to the person taking the attempt; the key is withheld.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptQuestionResponse {
    pub id: i64,
    pub version: i32,
    pub title: String,
    pub body: String,
    pub options: Vec<String>,
}

impl From<Question> for AttemptQuestionResponse {
    fn from(q: Question) -> Self {
        AttemptQuestionResponse {
            id: q.id,
            version: q.version,
            title: q.title,
            body: q.body,
            options: q.options.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptDetailResponse {
    #[serde(flatten)]
    pub attempt: AttemptResponse,
    pub questions: Vec<AttemptQuestionResponse>,
    pub answers: Vec<AnswerResponse>,
}

impl From<AttemptView> for AttemptDetailResponse {
    fn from(view: AttemptView) -> Self {
        AttemptDetailResponse {
            attempt: view.attempt.into(),
            questions: view.questions.into_iter().map(Into::into).collect(),
            answers: view.answers.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResultResponse {
    pub attempt_id: i64,
    pub is_finished: bool,
    pub finished_at: Option<DateTime<Utc>>,
    pub score: f64,
    pub correct: usize,
    pub total: usize,
    pub answers: Vec<GradedAnswer>,
}

impl From<AttemptResult> for AttemptResultResponse {
    fn from(result: AttemptResult) -> Self {
        AttemptResultResponse {
            attempt_id: result.attempt.id,
            is_finished: result.attempt.is_finished,
            finished_at: result.attempt.finished_at,
            score: result.grading.score.to_f64().unwrap_or(0.0),
            correct: result.grading.correct,
            total: result.grading.total,
            answers: result.grading.answers,
        }
    }
}
