pub mod auth;
pub mod cuarks;
pub mod error;
pub mod extract;
pub mod notifications;
pub mod session;
pub mod users;

use axum::{
    Json, Router,
    routing::{get, patch, post},
};
use serde_json::{Value, json};

use crate::auth::AppState;

/// Every API route. Handlers that take a [`session::CurrentUser`] require a
/// live session; the rest are public.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Users
        .route("/api/users/me", patch(users::update_me))
        .route("/api/users/{id}", get(users::get_user))
        .route("/api/users/{id}/followers", get(users::followers))
        .route("/api/users/{id}/following", get(users::following))
        .route("/api/users/{id}/is-following", get(users::is_following))
        .route("/api/users/{id}/follow", post(users::follow).delete(users::unfollow))
        // Cuarks
        .route("/api/cuarks", get(cuarks::list_cuarks).post(cuarks::create_cuark))
        .route("/api/cuarks/feed", get(cuarks::feed))
        .route("/api/cuarks/{id}", get(cuarks::get_cuark).delete(cuarks::delete_cuark))
        .route("/api/cuarks/{id}/like", post(cuarks::like).delete(cuarks::unlike))
        .route("/api/cuarks/{id}/repost", post(cuarks::repost).delete(cuarks::unrepost))
        // Notifications
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/{id}/read", post(notifications::mark_read))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
