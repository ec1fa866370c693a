use crate::error::{Error, Result};
use crate::models::attempt::Attempt;
use crate::models::question::Question;
use crate::models::test::Test;
use crate::services::attempt_service::{finalize_attempt, ATTEMPT_COLUMNS};
use crate::services::question_service::{ensure_not_retired, lock_question_ids};
use crate::utils::validation::validate_test_name;
use sqlx::{PgConnection, PgPool};

const TEST_COLUMNS: &str =
    "id, course_id, name, question_ids, is_active, is_deleted, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub test: Test,
    /// Open attempts closed by this change.
    pub finished_attempts: usize,
}

/// Test with its composition resolved to live question content.
#[derive(Debug, Clone)]
pub struct TestWithQuestions {
    pub test: Test,
    pub questions: Vec<Question>,
    /// Composition entries that currently have no live version.
    pub unavailable_question_ids: Vec<i64>,
}

#[derive(Clone)]
pub struct TestService {
    pool: PgPool,
}

impl TestService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Tests are always authored inactive.
    pub async fn create_test(&self, course_id: i64, name: &str, question_ids: &[i64]) -> Result<Test> {
        validate_test_name(name)?;

        let mut tx = self.pool.begin().await?;
        lock_question_ids(&mut tx, question_ids).await?;
        ensure_not_retired(&mut tx, question_ids).await?;

        let test = sqlx::query_as::<_, Test>(&format!(
            r#"
            INSERT INTO tests (course_id, name, question_ids, is_active)
            VALUES ($1, $2, $3, FALSE)
            RETURNING {TEST_COLUMNS}
            "#
        ))
        .bind(course_id)
        .bind(name.trim())
        .bind(question_ids)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(test_id = test.id, course_id, "test created");
        Ok(test)
    }

    pub async fn get_test(&self, test_id: i64) -> Result<Test> {
        sqlx::query_as::<_, Test>(&format!(
            "SELECT {TEST_COLUMNS} FROM tests WHERE id = $1 AND NOT is_deleted"
        ))
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    pub async fn get_test_with_questions(&self, test_id: i64) -> Result<TestWithQuestions> {
        let test = self.get_test(test_id).await?;

        let live = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, version, title, body, options, correct_option, author_id, is_deleted, created_at
            FROM questions
            WHERE id = ANY($1) AND NOT is_deleted
            "#,
        )
        .bind(&test.question_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut questions = Vec::with_capacity(test.question_ids.len());
        let mut unavailable_question_ids = Vec::new();
        for id in &test.question_ids {
            match live.iter().find(|q| q.id == *id) {
                Some(q) => questions.push(q.clone()),
                None => unavailable_question_ids.push(*id),
            }
        }

        Ok(TestWithQuestions {
            test,
            questions,
            unavailable_question_ids,
        })
    }

    pub async fn list_course_tests(&self, course_id: i64) -> Result<Vec<Test>> {
        let tests = sqlx::query_as::<_, Test>(&format!(
            "SELECT {TEST_COLUMNS} FROM tests WHERE course_id = $1 AND NOT is_deleted ORDER BY id"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tests)
    }

    pub async fn rename_test(&self, test_id: i64, name: &str) -> Result<Test> {
        validate_test_name(name)?;

        sqlx::query_as::<_, Test>(&format!(
            r#"
            UPDATE tests SET name = $2, updated_at = NOW()
            WHERE id = $1 AND NOT is_deleted
            RETURNING {TEST_COLUMNS}
            "#
        ))
        .bind(test_id)
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
    }

    /// Flips `is_active`. Deactivation finishes every open attempt of the
    /// test in the same transaction.
    pub async fn set_test_status(&self, test_id: i64, active: bool) -> Result<StatusChange> {
        let mut tx = self.pool.begin().await?;
        lock_test(&mut tx, test_id).await?;

        let test = sqlx::query_as::<_, Test>(&format!(
            r#"
            UPDATE tests SET is_active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {TEST_COLUMNS}
            "#
        ))
        .bind(test_id)
        .bind(active)
        .fetch_one(&mut *tx)
        .await?;

        let finished_attempts = if active {
            0
        } else {
            finish_open_attempts(&mut tx, test_id).await?
        };

        tx.commit().await?;

        tracing::info!(test_id, active, finished_attempts, "test status changed");
        Ok(StatusChange {
            test,
            finished_attempts,
        })
    }

    /// Soft delete. The test is also deactivated, so its open attempts are
    /// finished in the same transaction.
    pub async fn delete_test(&self, test_id: i64) -> Result<StatusChange> {
        let mut tx = self.pool.begin().await?;
        lock_test(&mut tx, test_id).await?;

        let test = sqlx::query_as::<_, Test>(&format!(
            r#"
            UPDATE tests SET is_deleted = TRUE, is_active = FALSE, updated_at = NOW()
            WHERE id = $1
            RETURNING {TEST_COLUMNS}
            "#
        ))
        .bind(test_id)
        .fetch_one(&mut *tx)
        .await?;

        let finished_attempts = finish_open_attempts(&mut tx, test_id).await?;
        tx.commit().await?;

        tracing::info!(test_id, finished_attempts, "test deleted");
        Ok(StatusChange {
            test,
            finished_attempts,
        })
    }

    pub async fn add_question_to_test(&self, test_id: i64, question_id: i64) -> Result<Test> {
        self.edit_composition(
            test_id,
            "question_ids = array_append(question_ids, $2)",
            question_id,
            true,
        )
        .await
    }

    /// Removes every occurrence of `question_id` from the composition.
    pub async fn remove_question_from_test(&self, test_id: i64, question_id: i64) -> Result<Test> {
        self.edit_composition(
            test_id,
            "question_ids = array_remove(question_ids, $2)",
            question_id,
            false,
        )
        .await
    }

    /// Replaces the ordered composition wholesale; used for reordering.
    pub async fn replace_questions(&self, test_id: i64, question_ids: &[i64]) -> Result<Test> {
        let mut tx = self.pool.begin().await?;
        lock_test(&mut tx, test_id).await?;
        ensure_composition_unlocked(&mut tx, test_id).await?;
        lock_question_ids(&mut tx, question_ids).await?;
        ensure_not_retired(&mut tx, question_ids).await?;

        let test = sqlx::query_as::<_, Test>(&format!(
            r#"
            UPDATE tests SET question_ids = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {TEST_COLUMNS}
            "#
        ))
        .bind(test_id)
        .bind(question_ids)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(test_id, questions = test.question_ids.len(), "test composition replaced");
        Ok(test)
    }

    pub async fn list_test_attempts(&self, test_id: i64) -> Result<Vec<Attempt>> {
        self.get_test(test_id).await?;
        let attempts = sqlx::query_as::<_, Attempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE test_id = $1 ORDER BY id"
        ))
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    async fn edit_composition(
        &self,
        test_id: i64,
        assignment: &str,
        question_id: i64,
        adds_reference: bool,
    ) -> Result<Test> {
        let mut tx = self.pool.begin().await?;
        lock_test(&mut tx, test_id).await?;
        ensure_composition_unlocked(&mut tx, test_id).await?;
        if adds_reference {
            lock_question_ids(&mut tx, &[question_id]).await?;
            ensure_not_retired(&mut tx, &[question_id]).await?;
        }

        let test = sqlx::query_as::<_, Test>(&format!(
            r#"
            UPDATE tests SET {assignment}, updated_at = NOW()
            WHERE id = $1
            RETURNING {TEST_COLUMNS}
            "#
        ))
        .bind(test_id)
        .bind(question_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(test_id, question_id, "test composition changed");
        Ok(test)
    }
}

/// Locks a non-deleted test row for the rest of the transaction.
async fn lock_test(conn: &mut PgConnection, test_id: i64) -> Result<()> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT id FROM tests WHERE id = $1 AND NOT is_deleted FOR UPDATE")
            .bind(test_id)
            .fetch_optional(&mut *conn)
            .await?;
    found
        .map(|_| ())
        .ok_or_else(|| Error::NotFound(format!("Test {} not found", test_id)))
}

/// Composition is frozen once any attempt references the test.
async fn ensure_composition_unlocked(conn: &mut PgConnection, test_id: i64) -> Result<()> {
    let attempts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE test_id = $1")
        .bind(test_id)
        .fetch_one(&mut *conn)
        .await?;

    if attempts > 0 {
        tracing::warn!(test_id, attempts, "composition locked by existing attempts");
        return Err(Error::Conflict(format!(
            "Test {} composition is locked: {} attempt(s) exist",
            test_id, attempts
        )));
    }
    Ok(())
}

async fn finish_open_attempts(conn: &mut PgConnection, test_id: i64) -> Result<usize> {
    let open = sqlx::query_as::<_, Attempt>(&format!(
        r#"
        SELECT {ATTEMPT_COLUMNS} FROM attempts
        WHERE test_id = $1 AND NOT is_finished
        ORDER BY id
        FOR UPDATE
        "#
    ))
    .bind(test_id)
    .fetch_all(&mut *conn)
    .await?;

    let count = open.len();
    for attempt in open {
        let result = finalize_attempt(&mut *conn, attempt).await?;
        tracing::info!(
            attempt_id = result.attempt.id,
            score = %result.grading.score,
            "attempt force-finished"
        );
    }
    Ok(count)
}
