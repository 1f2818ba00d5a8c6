use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;

use cuark_db::models::ProfileUpdate;
use cuark_db::social::InsertOutcome;
use cuark_types::api::{IsFollowingResponse, SuccessResponse, UpdateProfileRequest};

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::session::CurrentUser;

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let profile = run_db(&state, move |db| db.get_user_with_stats(&user_id))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(profile))
}

/// PATCH /api/users/me: partial profile edit for the caller.
pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let update = ProfileUpdate {
        name: req.name,
        bio: req.bio,
        avatar: req.avatar,
        banner_image: req.banner_image,
        location: req.location,
        website: req.website,
    };
    let profile = run_db(&state, move |db| {
        if db.update_user(&user.id, &update)?.is_none() {
            return Ok(None);
        }
        db.get_user_with_stats(&user.id)
    })
    .await?
    .ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(profile))
}

pub async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let users = run_db(&state, move |db| db.get_followers(&user_id)).await?;
    Ok(Json(users))
}

pub async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let users = run_db(&state, move |db| db.get_following(&user_id)).await?;
    Ok(Json(users))
}

pub async fn is_following(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let is_following = run_db(&state, move |db| db.is_following(&user.id, &user_id)).await?;
    Ok(Json(IsFollowingResponse { is_following }))
}

pub async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let follower = user.id.clone();
    let target = user_id.clone();
    match run_db(&state, move |db| db.follow_user(&follower, &target)).await? {
        InsertOutcome::Inserted => info!("{} followed {}", user.username, user_id),
        InsertOutcome::Duplicate => {}
        InsertOutcome::SelfTarget => {
            return Err(ApiError::BadRequest("You cannot follow yourself".into()));
        }
        InsertOutcome::TargetMissing => return Err(ApiError::NotFound("User not found")),
    }
    Ok(Json(SuccessResponse::ok()))
}

pub async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    run_db(&state, move |db| db.unfollow_user(&user.id, &user_id)).await?;
    Ok(Json(SuccessResponse::ok()))
}
