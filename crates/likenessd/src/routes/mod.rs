pub mod admin;
pub mod api;
pub mod auth;
pub mod pages;

use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Slack on top of the configured photo size for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/persons", post(api::create_person).get(api::list_persons))
        .route(
            "/persons/{id}",
            get(api::get_person)
                .put(api::update_person)
                .delete(api::delete_person),
        )
        .route("/persons/{id}/photos", post(api::upload_photo))
        .route("/persons/{id}/stats", get(api::person_stats))
        .route("/photos/{id}", delete(api::deactivate_photo))
        .route("/identify", post(api::identify))
        .route("/health", get(api::health))
        .route("/stats", get(api::system_stats))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}/approve", post(admin::approve_user))
        .route("/admin/users/{id}", delete(admin::delete_user));

    Router::new()
        .nest("/api", api)
        .merge(pages::router())
        .nest_service("/uploads", ServeDir::new(state.uploads.root()))
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_bytes + MULTIPART_OVERHEAD,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
