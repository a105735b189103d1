pub mod auth;
pub mod middleware;
pub mod posts;
pub mod state;
pub mod users;

pub use state::AppState;

use axum::{
    Router,
    routing::{delete, get, post, put},
    middleware as axum_middleware,
};
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
    timeout::TimeoutLayer,
};
use std::time::Duration;
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    search: bool,
}

pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    // Everything here needs a valid bearer session
    let protected = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))

        .route("/api/feed", get(posts::feed))
        .route("/api/explore", get(posts::explore))
        .route("/api/search", get(posts::search))
        .route("/api/posts", post(posts::create_post))
        .route("/api/posts/{id}", delete(posts::delete_post))

        .route("/api/users/{username}", get(users::profile))
        .route("/api/users/{username}/followers", get(users::followers))
        .route("/api/users/{username}/followed", get(users::followed))
        .route("/api/profile", put(users::edit_profile))
        .route("/api/follow/{username}", post(users::follow))
        .route("/api/unfollow/{username}", post(users::unfollow))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        // Health check
        .route("/api/health", get(health))

        // Authentication endpoints
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/reset_password_request", post(auth::reset_password_request))
        .route("/api/auth/reset_password", post(auth::reset_password))

        .merge(protected)
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        search: state.index.is_available(),
    })
}
