use crate::error::{is_unique_violation, Error, Result};
use crate::models::answer::{Answer, UNANSWERED};
use crate::models::attempt::Attempt;
use crate::models::identity::Identity;
use crate::models::question::Question;
use crate::models::test::Test;
use crate::services::grading_service::{AttemptScore, GradingService};
use crate::services::question_service::{load_frozen_questions, resolve_live_versions};
use crate::utils::validation::validate_option_index;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

pub(crate) const ATTEMPT_COLUMNS: &str =
    "id, user_id, test_id, question_versions, is_finished, started_at, finished_at, score";

const ATTEMPT_UNIQUE_CONSTRAINT: &str = "attempts_user_test_key";

/// Attempt together with how it was graded.
#[derive(Debug, Clone)]
pub struct AttemptResult {
    pub attempt: Attempt,
    pub grading: AttemptScore,
}

/// Attempt as its owner sees it: answers plus the frozen question rows in
/// composition order.
#[derive(Debug, Clone)]
pub struct AttemptView {
    pub attempt: Attempt,
    pub answers: Vec<Answer>,
    pub questions: Vec<Question>,
}

#[derive(Clone)]
pub struct AttemptService {
    pool: PgPool,
}

impl AttemptService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens the caller's single attempt on `test_id`, freezing the live
    /// version of every question in the composition.
    pub async fn start_attempt(&self, identity: &Identity, test_id: i64) -> Result<Attempt> {
        identity.ensure_not_blocked()?;
        let mut tx = self.pool.begin().await?;

        // FOR SHARE: status changes and composition edits lock the row FOR UPDATE.
        let test = sqlx::query_as::<_, Test>(
            r#"
            SELECT id, course_id, name, question_ids, is_active, is_deleted, created_at, updated_at
            FROM tests WHERE id = $1
            FOR SHARE
            "#,
        )
        .bind(test_id)
        .fetch_optional(&mut *tx)
        .await?
        .filter(|t| !t.is_deleted)
        .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))?;

        if !test.is_active {
            return Err(Error::Inactive(format!("Test {} is not active", test_id)));
        }
        if test.question_ids.is_empty() {
            return Err(Error::Conflict(format!("Test {} has no questions", test_id)));
        }

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM attempts WHERE user_id = $1 AND test_id = $2")
                .bind(identity.user_id)
                .bind(test_id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(existing_id) = existing {
            tracing::warn!(
                user_id = identity.user_id,
                test_id,
                existing_id,
                "attempt already exists"
            );
            return Err(Error::AlreadyExists(format!(
                "Attempt for test {} already exists (id {})",
                test_id, existing_id
            )));
        }

        let frozen = resolve_live_versions(&mut *tx, &test.question_ids).await?;
        let dropped = test
            .question_ids
            .iter()
            .filter(|id| !frozen.contains_key(*id))
            .count();
        if dropped > 0 {
            tracing::info!(test_id, dropped, "questions without a live version left out of attempt");
        }

        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            INSERT INTO attempts (user_id, test_id, question_versions, is_finished)
            VALUES ($1, $2, $3, FALSE)
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(identity.user_id)
        .bind(test_id)
        .bind(Json(&frozen))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, ATTEMPT_UNIQUE_CONSTRAINT) {
                Error::AlreadyExists(format!("Attempt for test {} already exists", test_id))
            } else {
                Error::from(e)
            }
        })?;

        let question_ids: Vec<i64> = frozen.keys().copied().collect();
        sqlx::query(
            r#"
            INSERT INTO answers (attempt_id, question_id, selected_option)
            SELECT $1, question_id, $3 FROM UNNEST($2::BIGINT[]) AS question_id
            "#,
        )
        .bind(attempt.id)
        .bind(&question_ids)
        .bind(UNANSWERED)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            attempt_id = attempt.id,
            user_id = identity.user_id,
            test_id,
            questions = question_ids.len(),
            "attempt started"
        );
        Ok(attempt)
    }

    pub async fn submit_answer(
        &self,
        identity: &Identity,
        attempt_id: i64,
        question_id: i64,
        selected_option: i32,
    ) -> Result<Answer> {
        identity.ensure_not_blocked()?;
        let mut tx = self.pool.begin().await?;

        // FOR SHARE so finishing (FOR UPDATE) waits for in-flight answers.
        let attempt = fetch_owned_attempt(&mut tx, identity, attempt_id, "FOR SHARE").await?;
        if attempt.is_finished {
            return Err(Error::Conflict(format!("Attempt {} is already finished", attempt_id)));
        }

        let version = attempt.frozen_version(question_id).ok_or_else(|| {
            Error::NotFound(format!(
                "Question {} is not part of attempt {}",
                question_id, attempt_id
            ))
        })?;

        let frozen_option_count: Option<i32> = sqlx::query_scalar(
            "SELECT jsonb_array_length(options) FROM questions WHERE id = $1 AND version = $2",
        )
        .bind(question_id)
        .bind(version)
        .fetch_optional(&mut *tx)
        .await?;
        let option_count = frozen_option_count.ok_or_else(|| {
            Error::NotFound(format!("Question {} version {} not found", question_id, version))
        })?;
        validate_option_index(selected_option, option_count.max(0) as usize)?;

        let answer = sqlx::query_as::<_, Answer>(
            r#"
            UPDATE answers SET selected_option = $3, answered_at = NOW()
            WHERE attempt_id = $1 AND question_id = $2
            RETURNING attempt_id, question_id, selected_option, answered_at
            "#,
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(selected_option)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "No answer for question {} in attempt {}",
                question_id, attempt_id
            ))
        })?;

        tx.commit().await?;
        tracing::debug!(attempt_id, question_id, selected_option, "answer saved");
        Ok(answer)
    }

    /// Grades and closes the attempt. Calling it on a finished attempt
    /// returns the stored result and writes nothing.
    pub async fn finish_attempt(&self, identity: &Identity, attempt_id: i64) -> Result<AttemptResult> {
        identity.ensure_not_blocked()?;
        let mut tx = self.pool.begin().await?;

        let attempt = fetch_owned_attempt(&mut tx, identity, attempt_id, "FOR UPDATE").await?;
        if attempt.is_finished {
            let grading = grade_attempt(&mut tx, &attempt).await?;
            tx.commit().await?;
            return Ok(AttemptResult { attempt, grading });
        }

        let result = finalize_attempt(&mut tx, attempt).await?;
        tx.commit().await?;

        tracing::info!(
            attempt_id,
            user_id = identity.user_id,
            score = %result.grading.score,
            "attempt finished"
        );
        Ok(result)
    }

    /// Re-derives the score from the frozen snapshot without writing.
    pub async fn recompute_score(&self, identity: &Identity, attempt_id: i64) -> Result<AttemptResult> {
        identity.ensure_not_blocked()?;
        let mut conn = self.pool.acquire().await?;
        let attempt = fetch_owned_attempt(&mut conn, identity, attempt_id, "").await?;
        let grading = grade_attempt(&mut conn, &attempt).await?;
        Ok(AttemptResult { attempt, grading })
    }

    pub async fn get_attempt(&self, identity: &Identity, attempt_id: i64) -> Result<AttemptView> {
        identity.ensure_not_blocked()?;
        let mut conn = self.pool.acquire().await?;
        let attempt = fetch_owned_attempt(&mut conn, identity, attempt_id, "").await?;
        let answers = load_answers(&mut conn, attempt.id).await?;

        let composition: Vec<i64> =
            sqlx::query_scalar("SELECT question_ids FROM tests WHERE id = $1")
                .bind(attempt.test_id)
                .fetch_one(&mut *conn)
                .await?;
        let frozen = load_frozen_questions(&mut conn, &attempt.question_versions.0).await?;
        let questions = order_by_composition(&composition, frozen);

        Ok(AttemptView {
            attempt,
            answers,
            questions,
        })
    }
}

/// Orders frozen rows the way the composition lists them. Repeated ids appear
/// once; rows the composition does not list go last, by id.
fn order_by_composition(composition: &[i64], mut questions: Vec<Question>) -> Vec<Question> {
    let mut ordered = Vec::with_capacity(questions.len());
    for id in composition {
        if let Some(pos) = questions.iter().position(|q| q.id == *id) {
            ordered.push(questions.remove(pos));
        }
    }
    questions.sort_by_key(|q| q.id);
    ordered.extend(questions);
    ordered
}

/// Loads an attempt visible to `identity`. Attempts of other users are
/// reported as missing.
async fn fetch_owned_attempt(
    conn: &mut PgConnection,
    identity: &Identity,
    attempt_id: i64,
    lock: &str,
) -> Result<Attempt> {
    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = $1 {lock}"
    ))
    .bind(attempt_id)
    .fetch_optional(&mut *conn)
    .await?
    .filter(|a| a.is_owned_by(identity.user_id))
    .ok_or_else(|| Error::NotFound(format!("Attempt {} not found", attempt_id)))?;
    Ok(attempt)
}

async fn load_answers(conn: &mut PgConnection, attempt_id: i64) -> Result<Vec<Answer>> {
    let answers = sqlx::query_as::<_, Answer>(
        r#"
        SELECT attempt_id, question_id, selected_option, answered_at
        FROM answers WHERE attempt_id = $1
        ORDER BY question_id
        "#,
    )
    .bind(attempt_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(answers)
}

async fn grade_attempt(conn: &mut PgConnection, attempt: &Attempt) -> Result<AttemptScore> {
    let answers = load_answers(&mut *conn, attempt.id).await?;
    let questions = load_frozen_questions(&mut *conn, &attempt.question_versions.0).await?;
    Ok(GradingService::grade(&attempt.question_versions.0, &answers, &questions))
}

/// Grades an open attempt and marks it finished. Runs on the caller's
/// connection so test deactivation can finish attempts inside its own
/// transaction; the caller must hold the attempt row `FOR UPDATE`.
pub(crate) async fn finalize_attempt(conn: &mut PgConnection, attempt: Attempt) -> Result<AttemptResult> {
    let grading = grade_attempt(&mut *conn, &attempt).await?;

    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        r#"
        UPDATE attempts
        SET is_finished = TRUE, finished_at = NOW(), score = $2
        WHERE id = $1
        RETURNING {ATTEMPT_COLUMNS}
        "#
    ))
    .bind(attempt.id)
    .bind(grading.score)
    .fetch_one(&mut *conn)
    .await?;

    Ok(AttemptResult { attempt, grading })
}
