pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::services::{
    attempt_service::AttemptService, question_service::QuestionService, test_service::TestService,
};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub question_service: QuestionService,
    pub test_service: TestService,
    pub attempt_service: AttemptService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let question_service = QuestionService::new(pool.clone());
        let test_service = TestService::new(pool.clone());
        let attempt_service = AttemptService::new(pool.clone());

        Self {
            pool,
            config: Arc::new(config),
            question_service,
            test_service,
            attempt_service,
        }
    }
}
