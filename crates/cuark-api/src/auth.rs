use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info};
use uuid::Uuid;

use cuark_db::Database;
use cuark_db::models::NewUser;
use cuark_types::api::{LoginRequest, RegisterRequest, SuccessResponse};

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::session::{self, CurrentUser, SessionConfig};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub session: SessionConfig,
}

/// Run blocking DB work off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::Internal)
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let username = req.username.clone();
    if run_db(&state, move |db| db.get_user_by_username(&username)).await?.is_some() {
        return Err(ApiError::BadRequest("Username already taken".into()));
    }
    let email = req.email.clone();
    if run_db(&state, move |db| db.get_user_by_email(&email)).await?.is_some() {
        return Err(ApiError::BadRequest("Email already registered".into()));
    }

    // Hash password with Argon2id
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(e.into()))??;

    let new_user = NewUser {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        password_hash,
        email: req.email,
        name: req.name,
        bio: req.bio,
        avatar: req.avatar,
        banner_image: req.banner_image,
        location: req.location,
        website: req.website,
    };

    // A concurrent registration can still win the race past the checks above.
    let row = match run_db(&state, move |db| db.create_user(&new_user)).await {
        Err(ApiError::Internal(e)) if cuark_db::is_constraint_violation(&e) => {
            return Err(ApiError::BadRequest("Username or email already registered".into()));
        }
        other => other?,
    };

    info!("Registered user {} ({})", row.username, row.id);
    let jar = session::start(&state, jar, row.id.clone()).await?;

    Ok((StatusCode::CREATED, jar, Json(row.into_user())))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.clone();
    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let stored = user.password.clone();
    let password = req.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(e.into()))??;
    if !valid {
        return Err(ApiError::InvalidCredentials);
    }

    let jar = session::start(&state, jar, user.id.clone()).await?;
    Ok((jar, Json(user.into_user())))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> ApiResult<impl IntoResponse> {
    let jar = session::end(&state, jar).await?;
    Ok((jar, Json(SuccessResponse::ok())))
}

pub async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult<impl IntoResponse> {
    let profile = run_db(&state, move |db| db.get_user_with_stats(&user.id))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(profile))
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// False on mismatch; errors only if the stored hash is unparseable.
fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("corrupt password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
        assert!(verify_password("x", "not-a-hash").is_err());
    }
}
