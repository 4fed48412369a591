use crate::handlers;
use crate::state::AppState;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static("x-request-id"),
        ]);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/quizzes", post(handlers::create_quiz).get(handlers::list_quizzes))
        .route("/api/v1/quizzes/:id", get(handlers::get_quiz))
        .route("/api/v1/quizzes/:id/submissions", post(handlers::submit_attempt))
        .route("/api/v1/quizzes/:id/leaderboard", get(handlers::get_leaderboard))
        .route("/api/v1/quizzes/:id/scores", get(handlers::list_scores))
        .route("/api/v1/quizzes/:id/attempts", post(handlers::start_attempt))
        .route(
            "/api/v1/attempts/:id",
            get(handlers::get_attempt).delete(handlers::abandon_attempt),
        )
        .route("/api/v1/attempts/:id/answer", put(handlers::record_answer))
        .route("/api/v1/attempts/:id/next", post(handlers::next_question))
        .route("/api/v1/attempts/:id/previous", post(handlers::previous_question))
        .route("/api/v1/attempts/:id/submit", post(handlers::finish_attempt))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
