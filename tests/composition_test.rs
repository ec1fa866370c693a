mod common;

use assessment_backend::error::Error;
use assessment_backend::models::question::QuestionEdit;
use assessment_backend::services::attempt_service::AttemptService;
use assessment_backend::services::question_service::QuestionService;
use assessment_backend::services::test_service::TestService;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio_test::{assert_err, assert_ok};

struct Services {
    pool: PgPool,
    questions: QuestionService,
    tests: TestService,
    attempts: AttemptService,
}

async fn services() -> Services {
    let pool = common::test_pool().await;
    Services {
        questions: QuestionService::new(pool.clone()),
        tests: TestService::new(pool.clone()),
        attempts: AttemptService::new(pool.clone()),
        pool,
    }
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn new_tests_start_inactive() {
    let s = services().await;
    let course_id = common::unique_id();
    let test = assert_ok!(s.tests.create_test(course_id, "  Midterm ", &[]).await);
    assert!(!test.is_active);
    assert_eq!(test.name, "Midterm");

    let err = assert_err!(s.tests.create_test(course_id, "   ", &[]).await);
    assert!(matches!(err, Error::Validation(_)));

    let listed = assert_ok!(s.tests.list_course_tests(course_id).await);
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn composition_edits_before_any_attempt() {
    let s = services().await;
    let author = common::author();
    let q1 = common::seed_question(&s.questions, &author, &["a", "b"], 0).await;
    let q2 = common::seed_question(&s.questions, &author, &["a", "b"], 1).await;
    let test = assert_ok!(s.tests.create_test(common::unique_id(), "Quiz", &[q1.id]).await);

    let test = assert_ok!(s.tests.add_question_to_test(test.id, q2.id).await);
    let test = assert_ok!(s.tests.add_question_to_test(test.id, q1.id).await);
    assert_eq!(test.question_ids, vec![q1.id, q2.id, q1.id]);

    let test = assert_ok!(s.tests.remove_question_from_test(test.id, q1.id).await);
    assert_eq!(test.question_ids, vec![q2.id]);

    let test = assert_ok!(s.tests.replace_questions(test.id, &[q2.id, q1.id]).await);
    assert_eq!(test.question_ids, vec![q2.id, q1.id]);
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn composition_locks_once_an_attempt_exists() {
    let s = services().await;
    let author = common::author();
    let q1 = common::seed_question(&s.questions, &author, &["a", "b"], 0).await;
    let q2 = common::seed_question(&s.questions, &author, &["a", "b"], 1).await;
    let test = common::active_test(&s.tests, &[q1.id]).await;

    assert_ok!(s.attempts.start_attempt(&common::student(), test.id).await);

    assert!(matches!(
        s.tests.add_question_to_test(test.id, q2.id).await,
        Err(Error::Conflict(_))
    ));
    assert!(matches!(
        s.tests.remove_question_from_test(test.id, q1.id).await,
        Err(Error::Conflict(_))
    ));
    assert!(matches!(
        s.tests.replace_questions(test.id, &[q2.id]).await,
        Err(Error::Conflict(_))
    ));

    // Deactivating does not unlock the composition.
    assert_ok!(s.tests.set_test_status(test.id, false).await);
    assert!(matches!(
        s.tests.add_question_to_test(test.id, q2.id).await,
        Err(Error::Conflict(_))
    ));

    let unchanged = assert_ok!(s.tests.get_test(test.id).await);
    assert_eq!(unchanged.question_ids, vec![q1.id]);
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn referenced_question_cannot_be_deleted() {
    let s = services().await;
    let q = common::seed_question(&s.questions, &common::author(), &["a", "b"], 0).await;
    let test = assert_ok!(s.tests.create_test(common::unique_id(), "Quiz", &[q.id]).await);

    let err = assert_err!(s.questions.delete_question(q.id).await);
    assert!(matches!(err, Error::Conflict(_)));

    assert_ok!(s.tests.remove_question_from_test(test.id, q.id).await);
    assert_ok!(s.questions.delete_question(q.id).await);

    assert!(matches!(
        s.questions.get_question(q.id).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        s.questions.delete_question(q.id).await,
        Err(Error::NotFound(_))
    ));
    let history = assert_ok!(s.questions.question_history(q.id).await);
    assert_eq!(history.len(), 1);
    assert!(history[0].is_deleted);
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn deleted_test_still_guards_its_questions() {
    let s = services().await;
    let q = common::seed_question(&s.questions, &common::author(), &["a", "b"], 0).await;
    let test = assert_ok!(s.tests.create_test(common::unique_id(), "Quiz", &[q.id]).await);
    assert_ok!(s.tests.delete_test(test.id).await);

    assert!(matches!(
        s.questions.delete_question(q.id).await,
        Err(Error::Conflict(_))
    ));
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn updates_keep_exactly_one_live_version() {
    let s = services().await;
    let q = common::seed_question(&s.questions, &common::author(), &["a", "b"], 0).await;

    for _ in 0..2 {
        assert_ok!(
            s.questions
                .update_question(
                    q.id,
                    QuestionEdit {
                        body: Some("Reworded".into()),
                        ..Default::default()
                    },
                )
                .await
        );
    }

    let live: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE id = $1 AND NOT is_deleted")
            .bind(q.id)
            .fetch_one(&s.pool)
            .await
            .unwrap();
    assert_eq!(live, 1);

    let current = assert_ok!(s.questions.get_question(q.id).await);
    assert_eq!(current.version, 3);
    assert_eq!(current.title, q.title);
    assert_eq!(current.author_id, q.author_id);

    let history = assert_ok!(s.questions.question_history(q.id).await);
    let versions: Vec<i32> = history.iter().map(|v| v.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);

    let first = assert_ok!(s.questions.get_question_version(q.id, 1).await);
    assert_eq!(first.body, q.body);

    let resolved = assert_ok!(s.questions.resolve_live_versions(&[q.id, i64::MAX - 2]).await);
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved.get(&q.id), Some(&3));
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn invalid_update_leaves_live_version_untouched() {
    let s = services().await;
    let q = common::seed_question(&s.questions, &common::author(), &["a", "b"], 0).await;

    let err = assert_err!(
        s.questions
            .update_question(
                q.id,
                QuestionEdit {
                    correct_option: Some(5),
                    ..Default::default()
                },
            )
            .await
    );
    assert!(matches!(err, Error::Validation(_)));

    let current = assert_ok!(s.questions.get_question(q.id).await);
    assert_eq!(current.version, 1);
    assert!(matches!(
        s.questions.update_question(i64::MAX - 3, QuestionEdit::default()).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn deactivation_finishes_open_attempts() {
    let s = services().await;
    let q = common::seed_question(&s.questions, &common::author(), &["a", "b"], 1).await;
    let test = common::active_test(&s.tests, &[q.id]).await;

    let good = common::student();
    let idle = common::student();
    let good_attempt = assert_ok!(s.attempts.start_attempt(&good, test.id).await);
    let idle_attempt = assert_ok!(s.attempts.start_attempt(&idle, test.id).await);
    assert_ok!(s.attempts.submit_answer(&good, good_attempt.id, q.id, 1).await);

    let change = assert_ok!(s.tests.set_test_status(test.id, false).await);
    assert!(!change.test.is_active);
    assert_eq!(change.finished_attempts, 2);

    let good_view = assert_ok!(s.attempts.get_attempt(&good, good_attempt.id).await);
    assert!(good_view.attempt.is_finished);
    assert_eq!(good_view.attempt.score, Some(Decimal::from(100)));

    let idle_view = assert_ok!(s.attempts.get_attempt(&idle, idle_attempt.id).await);
    assert!(idle_view.attempt.is_finished);
    assert_eq!(idle_view.attempt.score, Some(Decimal::ZERO));

    assert!(matches!(
        s.attempts.start_attempt(&common::student(), test.id).await,
        Err(Error::Inactive(_))
    ));

    // Reactivating finishes nothing.
    let change = assert_ok!(s.tests.set_test_status(test.id, true).await);
    assert_eq!(change.finished_attempts, 0);
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn deleting_a_test_closes_it() {
    let s = services().await;
    let q = common::seed_question(&s.questions, &common::author(), &["a", "b"], 1).await;
    let test = common::active_test(&s.tests, &[q.id]).await;
    let user = common::student();
    let attempt = assert_ok!(s.attempts.start_attempt(&user, test.id).await);

    let change = assert_ok!(s.tests.delete_test(test.id).await);
    assert_eq!(change.finished_attempts, 1);
    assert!(change.test.is_deleted);

    assert!(matches!(s.tests.get_test(test.id).await, Err(Error::NotFound(_))));
    assert!(matches!(
        s.tests.set_test_status(test.id, true).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        s.attempts.start_attempt(&common::student(), test.id).await,
        Err(Error::NotFound(_))
    ));

    let view = assert_ok!(s.attempts.get_attempt(&user, attempt.id).await);
    assert!(view.attempt.is_finished);
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn resolved_test_reports_unavailable_questions() {
    let s = services().await;
    let q = common::seed_question(&s.questions, &common::author(), &["a", "b"], 1).await;
    let missing = i64::MAX - 4;
    let course_id = common::unique_id();
    let test = assert_ok!(s.tests.create_test(course_id, "Quiz", &[q.id, missing]).await);

    let resolved = assert_ok!(s.tests.get_test_with_questions(test.id).await);
    assert_eq!(resolved.questions.len(), 1);
    assert_eq!(resolved.questions[0].id, q.id);
    assert_eq!(resolved.unavailable_question_ids, vec![missing]);

    let course_questions = assert_ok!(s.questions.list_course_questions(course_id).await);
    assert_eq!(
        course_questions.iter().map(|q| q.id).collect::<Vec<_>>(),
        vec![q.id]
    );
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn concurrent_edits_each_create_a_version() {
    let s = services().await;
    let q = common::seed_question(&s.questions, &common::author(), &["a", "b", "c"], 0).await;
    let rounds = 10;

    for round in 0..rounds {
        let (first, second) = tokio::join!(
            s.questions.update_question(
                q.id,
                QuestionEdit {
                    body: Some(format!("Wording {}", round)),
                    ..Default::default()
                },
            ),
            s.questions.update_question(
                q.id,
                QuestionEdit {
                    correct_option: Some(round % 3),
                    ..Default::default()
                },
            )
        );
        assert_ok!(first);
        assert_ok!(second);
    }

    let current = assert_ok!(s.questions.get_question(q.id).await);
    assert_eq!(current.version, 1 + 2 * rounds);

    let history = assert_ok!(s.questions.question_history(q.id).await);
    let versions: Vec<i32> = history.iter().map(|v| v.version).collect();
    assert_eq!(versions, (1..=1 + 2 * rounds).collect::<Vec<_>>());
    assert_eq!(history.iter().filter(|v| !v.is_deleted).count(), 1);
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn delete_and_add_never_both_succeed() {
    let s = services().await;
    let author = common::author();

    for _ in 0..20 {
        let q = common::seed_question(&s.questions, &author, &["a", "b"], 0).await;
        let test = assert_ok!(s.tests.create_test(common::unique_id(), "Quiz", &[]).await);

        let (added, deleted) = tokio::join!(
            s.tests.add_question_to_test(test.id, q.id),
            s.questions.delete_question(q.id)
        );
        let composition = assert_ok!(s.tests.get_test(test.id).await).question_ids;

        match (added, deleted) {
            (Ok(_), Err(Error::Conflict(_))) => {
                assert_eq!(composition, vec![q.id]);
                assert_ok!(s.questions.get_question(q.id).await);
            }
            (Err(Error::Conflict(_)), Ok(())) => {
                assert!(composition.is_empty());
                assert!(matches!(
                    s.questions.get_question(q.id).await,
                    Err(Error::NotFound(_))
                ));
            }
            (added, deleted) => panic!("unexpected outcome: add {:?}, delete {:?}", added, deleted),
        }
    }
}

#[tokio::test]
#[ignore = "needs PostgreSQL at DATABASE_URL"]
async fn deleted_question_cannot_join_a_composition() {
    let s = services().await;
    let q = common::seed_question(&s.questions, &common::author(), &["a", "b"], 0).await;
    assert_ok!(s.questions.delete_question(q.id).await);

    assert!(matches!(
        s.tests.create_test(common::unique_id(), "Quiz", &[q.id]).await,
        Err(Error::Conflict(_))
    ));

    let test = assert_ok!(s.tests.create_test(common::unique_id(), "Quiz", &[]).await);
    assert!(matches!(
        s.tests.add_question_to_test(test.id, q.id).await,
        Err(Error::Conflict(_))
    ));
    assert!(matches!(
        s.tests.replace_questions(test.id, &[q.id]).await,
        Err(Error::Conflict(_))
    ));
}
