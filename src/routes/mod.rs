pub mod attempt_routes;
pub mod health;
pub mod question_routes;
pub mod test_routes;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::{middleware::auth::require_identity, AppState};

/// Builds the full application router. Everything under `/api` requires a
/// bearer token.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/api/questions",
            get(question_routes::list_questions).post(question_routes::create_question),
        )
        .route(
            "/api/questions/:id",
            get(question_routes::get_question)
                .put(question_routes::update_question)
                .delete(question_routes::delete_question),
        )
        .route("/api/questions/:id/versions", get(question_routes::question_history))
        .route(
            "/api/questions/:id/versions/:version",
            get(question_routes::get_question_version),
        )
        .route(
            "/api/courses/:course_id/questions",
            get(question_routes::list_course_questions),
        )
        .route("/api/courses/:course_id/tests", get(test_routes::list_course_tests))
        .route("/api/tests", post(test_routes::create_test))
        .route(
            "/api/tests/:id",
            get(test_routes::get_test)
                .patch(test_routes::rename_test)
                .delete(test_routes::delete_test),
        )
        .route("/api/tests/:id/status", put(test_routes::set_test_status))
        .route(
            "/api/tests/:id/questions",
            put(test_routes::replace_questions).post(test_routes::add_question),
        )
        .route(
            "/api/tests/:id/questions/:question_id",
            delete(test_routes::remove_question),
        )
        .route(
            "/api/tests/:id/attempts",
            get(test_routes::list_test_attempts).post(attempt_routes::start_attempt),
        )
        .route("/api/attempts/:id", get(attempt_routes::get_attempt))
        .route(
            "/api/attempts/:id/answers/:question_id",
            put(attempt_routes::submit_answer),
        )
        .route("/api/attempts/:id/finish", post(attempt_routes::finish_attempt))
        .route("/api/attempts/:id/score", get(attempt_routes::attempt_score))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(api)
        .with_state(state)
}
