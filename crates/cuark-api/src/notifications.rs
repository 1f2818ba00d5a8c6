use axum::{Json, extract::State, response::IntoResponse};

use cuark_db::cuarks::DEFAULT_LIMIT;
use cuark_types::api::SuccessResponse;

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult};
use crate::extract::IdPath;
use crate::session::CurrentUser;

pub async fn list(State(state): State<AppState>, user: CurrentUser) -> ApiResult<impl IntoResponse> {
    let notifications = run_db(&state, move |db| db.get_notifications(&user.id, DEFAULT_LIMIT)).await?;
    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    if !run_db(&state, move |db| db.mark_notification_as_read(id, &user.id)).await? {
        return Err(ApiError::NotFound("Notification not found"));
    }
    Ok(Json(SuccessResponse::ok()))
}

pub async fn mark_all_read(State(state): State<AppState>, user: CurrentUser) -> ApiResult<impl IntoResponse> {
    run_db(&state, move |db| db.mark_all_notifications_as_read(&user.id)).await?;
    Ok(Json(SuccessResponse::ok()))
}
