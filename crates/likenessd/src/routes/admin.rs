//! User administration; every handler requires an admin session.

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use likeness_store::User;
use serde_json::json;

pub async fn list_users(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.store.list_users().await?))
}

pub async fn approve_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.store.approve_user(id).await? {
        return Err(ApiError::NotFound(format!("user {id} not found")));
    }
    tracing::info!(user_id = id, by = admin.id, "user approved");
    Ok(Json(json!({ "message": "user approved" })))
}

pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.store.delete_user(id).await? {
        return Err(ApiError::NotFound(format!("user {id} not found")));
    }
    tracing::info!(user_id = id, by = admin.id, "user deleted");
    Ok(Json(json!({ "message": "user deleted" })))
}
