//! Session plumbing: password digests, tokens, and request extractors.

use crate::error::ApiError;
use crate::state::AppState;
use crate::util::hex_string;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use chrono::Utc;
use likeness_store::User;
use sha2::{Digest, Sha256};

pub const SESSION_COOKIE: &str = "likeness_session";

/// SHA-256 hex digest of a password.
pub fn password_digest(password: &str) -> String {
    hex_string(&Sha256::digest(password.as_bytes()))
}

/// 32 random bytes, hex-encoded.
pub fn new_session_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex_string(&bytes)
}

/// Pull the session token from `Authorization: Bearer` or the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// Extractor for any logged-in, approved user.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("missing session token".into()))?;
        let user = state
            .store
            .session_user(token, Utc::now())
            .await?
            .ok_or_else(|| ApiError::Unauthorized("session expired or invalid".into()))?;
        Ok(CurrentUser(user))
    }
}

/// Extractor that additionally requires the admin flag.
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiError::Forbidden("administrator access required".into()));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn digest_is_stable_hex() {
        let digest = password_digest("secret");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, password_digest("secret"));
        assert_ne!(digest, password_digest("Secret"));
    }

    #[test]
    fn tokens_are_unique() {
        let a = new_session_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, new_session_token());
    }

    #[test]
    fn token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; likeness_session=tok42; other=1"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("tok42"));
    }

    #[test]
    fn no_token_when_absent() {
        let headers = HeaderMap::new();
        assert!(session_token(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert!(session_token(&headers).is_none());
    }
}
