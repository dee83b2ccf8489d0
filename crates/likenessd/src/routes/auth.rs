//! Account registration, login, and session lifecycle.

use crate::auth::{self, CurrentUser, SESSION_COOKIE};
use crate::error::ApiError;
use crate::state::AppState;
use crate::validate;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use likeness_store::User;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// The first account becomes an active admin; later registrations wait for
/// approval.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<Json<User>, ApiError> {
    let username = validate::username(&req.username)?;
    let password = validate::password(&req.password)?;

    let is_first = state.store.user_count().await? == 0;
    let user = state
        .store
        .create_user(username, auth::password_digest(password), is_first, is_first)
        .await?
        .ok_or_else(|| ApiError::Validation("username already taken".into()))?;

    tracing::info!(user_id = user.id, admin = user.is_admin, "user registered");
    Ok(Json(user))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<Response, ApiError> {
    let user = state
        .store
        .user_by_credentials(req.username.trim().to_string(), auth::password_digest(&req.password))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid username or password".into()))?;

    if !user.is_active {
        return Err(ApiError::Forbidden(
            "account is awaiting administrator approval".into(),
        ));
    }

    let now = Utc::now();
    match state.store.purge_expired_sessions(now).await {
        Ok(purged) if purged > 0 => tracing::debug!(purged, "purged expired sessions"),
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "session purge failed"),
    }

    let token = auth::new_session_token();
    let ttl = Duration::hours(state.config.session_ttl_hours);
    state
        .store
        .create_session(token.clone(), user.id, now + ttl)
        .await?;

    tracing::info!(user_id = user.id, "login");

    let cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.num_seconds()
    );
    let mut response = Json(LoginResponse { token, user }).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|err| ApiError::Internal(err.into()))?,
    );
    Ok(response)
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(token) = auth::session_token(&headers) {
        state.store.delete_session(token).await?;
    }

    let cleared = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
    let mut response = Json(json!({ "message": "logged out" })).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cleared).map_err(|err| ApiError::Internal(err.into()))?,
    );
    Ok(response)
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
