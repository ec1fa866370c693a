use crate::error::{Error, Result};
use crate::models::attempt::QuestionVersions;
use crate::models::identity::Identity;
use crate::models::question::{Question, QuestionContent, QuestionEdit};
use crate::utils::validation::validate_question_content;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

const QUESTION_COLUMNS: &str =
    "id, version, title, body, options, correct_option, author_id, is_deleted, created_at";

#[derive(Clone)]
pub struct QuestionService {
    pool: PgPool,
}

impl QuestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_question(
        &self,
        author: &Identity,
        content: QuestionContent,
    ) -> Result<Question> {
        author.ensure_not_blocked()?;
        validate_question_content(&content)?;

        let question = sqlx::query_as::<_, Question>(&format!(
            r#"
            INSERT INTO questions (id, version, title, body, options, correct_option, author_id, is_deleted)
            VALUES (nextval('question_id_seq'), 1, $1, $2, $3, $4, $5, FALSE)
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(&content.title)
        .bind(&content.body)
        .bind(Json(&content.options))
        .bind(content.correct_option)
        .bind(author.user_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(question_id = question.id, author_id = author.user_id, "question created");
        Ok(question)
    }

    /// Appends a new version built from the live one; the live row is retired
    /// in the same transaction.
    pub async fn update_question(&self, question_id: i64, edit: QuestionEdit) -> Result<Question> {
        let mut tx = self.pool.begin().await?;
        // The live row is read after the lock so a version committed by a
        // concurrent edit is visible.
        lock_question_ids(&mut tx, &[question_id]).await?;

        let live = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1 AND NOT is_deleted FOR UPDATE"
        ))
        .bind(question_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Question {} not found", question_id)))?;

        let content = edit.apply_to(&live);
        validate_question_content(&content)?;

        sqlx::query("UPDATE questions SET is_deleted = TRUE WHERE id = $1 AND version = $2")
            .bind(live.id)
            .bind(live.version)
            .execute(&mut *tx)
            .await?;

        let next = sqlx::query_as::<_, Question>(&format!(
            r#"
            INSERT INTO questions (id, version, title, body, options, correct_option, author_id, is_deleted)
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE)
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(live.id)
        .bind(live.version + 1)
        .bind(&content.title)
        .bind(&content.body)
        .bind(Json(&content.options))
        .bind(content.correct_option)
        .bind(live.author_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            question_id = next.id,
            version = next.version,
            "question updated to a new version"
        );
        Ok(next)
    }

    /// Soft-deletes the live version. Refused while any test composition,
    /// active or not, still lists the question.
    pub async fn delete_question(&self, question_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        lock_question_ids(&mut tx, &[question_id]).await?;

        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM tests WHERE $1 = ANY(question_ids))",
        )
        .bind(question_id)
        .fetch_one(&mut *tx)
        .await?;

        if referenced {
            tracing::warn!(question_id, "refusing to delete question referenced by a test");
            return Err(Error::Conflict(format!(
                "Question {} is used in one or more tests",
                question_id
            )));
        }

        let result =
            sqlx::query("UPDATE questions SET is_deleted = TRUE WHERE id = $1 AND NOT is_deleted")
                .bind(question_id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Question {} not found", question_id)));
        }

        tx.commit().await?;
        tracing::info!(question_id, "question marked as deleted");
        Ok(())
    }

    pub async fn resolve_live_versions(&self, question_ids: &[i64]) -> Result<QuestionVersions> {
        let mut conn = self.pool.acquire().await?;
        resolve_live_versions(&mut *conn, question_ids).await
    }

    pub async fn get_question(&self, question_id: i64) -> Result<Question> {
        sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1 AND NOT is_deleted"
        ))
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Question {} not found", question_id)))
    }

    pub async fn get_question_version(&self, question_id: i64, version: i32) -> Result<Question> {
        sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1 AND version = $2"
        ))
        .bind(question_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!("Question {} version {} not found", question_id, version))
        })
    }

    /// Every version ever written for `question_id`, oldest first.
    pub async fn question_history(&self, question_id: i64) -> Result<Vec<Question>> {
        let versions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1 ORDER BY version"
        ))
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        if versions.is_empty() {
            return Err(Error::NotFound(format!("Question {} not found", question_id)));
        }
        Ok(versions)
    }

    pub async fn list_questions(&self) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE NOT is_deleted ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    /// Live questions referenced by any non-deleted test of the course.
    pub async fn list_course_questions(&self, course_id: i64) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            r#"
            SELECT {QUESTION_COLUMNS} FROM questions
            WHERE NOT is_deleted
              AND id IN (
                  SELECT UNNEST(question_ids) FROM tests
                  WHERE course_id = $1 AND NOT is_deleted
              )
            ORDER BY id
            "#
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }
}

/// Serializes writers of the given question identities until the
/// transaction ends. Edits, deletes and composition changes all take this
/// lock; ids are locked in ascending order.
pub(crate) async fn lock_question_ids(conn: &mut PgConnection, question_ids: &[i64]) -> Result<()> {
    if question_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        SELECT pg_advisory_xact_lock(id)
        FROM (SELECT DISTINCT id FROM UNNEST($1::BIGINT[]) AS id ORDER BY id) AS ids
        "#,
    )
    .bind(question_ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Refuses ids whose every version has been deleted. Ids with no rows at all
/// are accepted.
pub(crate) async fn ensure_not_retired(conn: &mut PgConnection, question_ids: &[i64]) -> Result<()> {
    if question_ids.is_empty() {
        return Ok(());
    }

    let retired: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM questions
        WHERE id = ANY($1)
        GROUP BY id
        HAVING bool_and(is_deleted)
        ORDER BY id
        "#,
    )
    .bind(question_ids)
    .fetch_all(&mut *conn)
    .await?;

    if !retired.is_empty() {
        tracing::warn!(?retired, "refusing to reference deleted questions");
        return Err(Error::Conflict(format!(
            "Questions {:?} have been deleted",
            retired
        )));
    }
    Ok(())
}

/// Maps each id to the version of its live row; ids without one are omitted.
pub(crate) async fn resolve_live_versions(
    conn: &mut PgConnection,
    question_ids: &[i64],
) -> Result<QuestionVersions> {
    if question_ids.is_empty() {
        return Ok(QuestionVersions::new());
    }

    let rows: Vec<(i64, i32)> = sqlx::query_as(
        r#"
        SELECT id, MAX(version) FROM questions
        WHERE id = ANY($1) AND NOT is_deleted
        GROUP BY id
        "#,
    )
    .bind(question_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Loads the exact `(id, version)` rows of a frozen snapshot.
pub(crate) async fn load_frozen_questions(
    conn: &mut PgConnection,
    frozen: &QuestionVersions,
) -> Result<Vec<Question>> {
    if frozen.is_empty() {
        return Ok(Vec::new());
    }

    let (ids, versions): (Vec<i64>, Vec<i32>) = frozen.iter().map(|(id, v)| (*id, *v)).unzip();
    let questions = sqlx::query_as::<_, Question>(&format!(
        r#"
        SELECT {QUESTION_COLUMNS} FROM questions
        WHERE (id, version) IN (SELECT * FROM UNNEST($1::BIGINT[], $2::INT[]))
        "#
    ))
    .bind(&ids)
    .bind(&versions)
    .fetch_all(&mut *conn)
    .await?;
    Ok(questions)
}
