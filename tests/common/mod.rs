#![allow(dead_code)]

use std::env;
use std::sync::atomic::{AtomicI64, Ordering};

use assessment_backend::config::{Config, LogFormat};
use assessment_backend::models::identity::Identity;
use assessment_backend::models::question::{Question, QuestionContent};
use assessment_backend::models::test::Test;
use assessment_backend::services::question_service::QuestionService;
use assessment_backend::services::test_service::TestService;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub const JWT_SECRET: &str = "integration_test_secret";

static COUNTER: AtomicI64 = AtomicI64::new(0);

/// Connects to `DATABASE_URL` and applies migrations. Database tests are
/// `#[ignore]`d; run them with `cargo test -- --ignored` against PostgreSQL.
pub async fn test_pool() -> PgPool {
    dotenvy::dotenv().ok();
    let url = env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

/// Id that no other test run will hand out, for users and courses.
pub fn unique_id() -> i64 {
    let micros = chrono::Utc::now().timestamp_micros() % 1_000_000_000_000;
    micros * 1000 + COUNTER.fetch_add(1, Ordering::Relaxed) % 1000
}

pub fn test_config(database_url: &str) -> Config {
    Config {
        server_address: "127.0.0.1:0".to_string(),
        database_url: database_url.to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        database_max_connections: 5,
        database_acquire_timeout_secs: 5,
        log_format: LogFormat::Text,
    }
}

pub fn student() -> Identity {
    Identity::new(unique_id(), "student")
}

pub fn author() -> Identity {
    Identity::new(unique_id(), "instructor")
}

pub async fn seed_question(
    questions: &QuestionService,
    author: &Identity,
    options: &[&str],
    correct_option: i32,
) -> Question {
    questions
        .create_question(
            author,
            QuestionContent {
                title: "Seed".to_string(),
                body: "Pick one".to_string(),
                options: options.iter().map(|o| o.to_string()).collect(),
                correct_option,
            },
        )
        .await
        .expect("create question")
}

/// Creates a test over `question_ids` and opens it for attempts.
pub async fn active_test(tests: &TestService, question_ids: &[i64]) -> Test {
    let test = tests
        .create_test(unique_id(), "Quiz", question_ids)
        .await
        .expect("create test");
    tests
        .set_test_status(test.id, true)
        .await
        .expect("activate test")
        .test
}
