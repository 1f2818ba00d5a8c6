//! Cookie-backed server-side sessions.
//!
//! The client holds a random token in the `cuark_session` cookie; the
//! database only ever sees its SHA-256 hash.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

use crate::auth::{AppState, run_db};
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "cuark_session";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ttl: chrono::Duration,
    /// Set the `Secure` attribute; enable when served over HTTPS.
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::days(30),
            secure_cookie: false,
        }
    }
}

/// The authenticated caller. Extracting it rejects with 401 when the request
/// carries no live session.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or(ApiError::Unauthenticated)?;

        let token_hash = hash_token(&token);
        let user = run_db(state, move |db| db.get_session_user(&token_hash))
            .await?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(Self {
            id: user.id,
            username: user.username,
        })
    }
}

pub fn new_token() -> String {
    let bytes: [u8; 32] = rand::random();
    B64.encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Persist a fresh session for `user_id` and add its cookie to `jar`.
pub async fn start(state: &AppState, jar: CookieJar, user_id: String) -> Result<CookieJar, ApiError> {
    let token = new_token();
    let token_hash = hash_token(&token);
    let expires_at = (chrono::Utc::now() + state.session.ttl).to_rfc3339_opts(SecondsFormat::Millis, true);

    run_db(state, move |db| db.create_session(&token_hash, &user_id, &expires_at)).await?;

    Ok(jar.add(session_cookie(token, &state.session)))
}

fn session_cookie(token: String, config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookie)
        .path("/")
        .max_age(cookie::time::Duration::seconds(config.ttl.num_seconds()))
        .build()
}

/// Drop the session named by the request cookie, if any, and clear the cookie.
pub async fn end(state: &AppState, jar: CookieJar) -> Result<CookieJar, ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let token_hash = hash_token(cookie.value());
        run_db(state, move |db| db.delete_session(&token_hash)).await?;
    }
    Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_random_and_url_safe() {
        let a = new_token();
        let b = new_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn cookie_lives_as_long_as_the_session() {
        let config = SessionConfig {
            ttl: chrono::Duration::days(7),
            secure_cookie: true,
        };
        let built = session_cookie("tok".into(), &config);
        assert_eq!(built.max_age(), Some(cookie::time::Duration::days(7)));
        assert_eq!(built.http_only(), Some(true));
        assert_eq!(built.secure(), Some(true));
        assert_eq!(built.same_site(), Some(SameSite::Lax));
        assert_eq!(built.path(), Some("/"));
    }

    #[test]
    fn hash_is_stable_hex() {
        let h = hash_token("abc");
        assert_eq!(h, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(hash_token("abc"), h);
    }
}
