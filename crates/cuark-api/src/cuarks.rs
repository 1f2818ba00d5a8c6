use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};

use cuark_db::cuarks::DEFAULT_LIMIT;
use cuark_db::social::InsertOutcome;
use cuark_types::api::{CreateCuarkRequest, CuarkListQuery, SuccessResponse};

use crate::auth::{AppState, run_db};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, IdPath};
use crate::session::CurrentUser;

const NOT_FOUND: &str = "Cuark not found";

pub async fn create_cuark(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateCuarkRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    if let Some(parent) = req.reply_to_id {
        if !run_db(&state, move |db| db.cuark_exists(parent)).await? {
            return Err(ApiError::NotFound("Reply target not found"));
        }
    }

    let author_id = user.id.clone();
    let id = run_db(&state, move |db| {
        db.create_cuark(&author_id, &req.content, req.image_url.as_deref(), req.reply_to_id)
    })
    .await?;

    // Separate round trip: the author may delete it before we read it back.
    let cuark = run_db(&state, move |db| db.get_cuark(id))
        .await?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;

    info!("{} posted cuark {}", user.username, id);
    Ok((StatusCode::CREATED, Json(cuark)))
}

/// GET /api/cuarks?userId=: recent cuarks, optionally by one author.
pub async fn list_cuarks(
    State(state): State<AppState>,
    Query(query): Query<CuarkListQuery>,
) -> ApiResult<impl IntoResponse> {
    let cuarks = run_db(&state, move |db| db.get_cuarks(query.user_id.as_deref(), DEFAULT_LIMIT)).await?;
    Ok(Json(cuarks))
}

pub async fn feed(State(state): State<AppState>, user: CurrentUser) -> ApiResult<impl IntoResponse> {
    let cuarks = run_db(&state, move |db| db.get_feed_cuarks(&user.id, DEFAULT_LIMIT)).await?;
    Ok(Json(cuarks))
}

pub async fn get_cuark(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<impl IntoResponse> {
    let cuark = run_db(&state, move |db| db.get_cuark(id))
        .await?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;
    Ok(Json(cuark))
}

pub async fn delete_cuark(
    State(state): State<AppState>,
    user: CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let user_id = user.id.clone();
    if !run_db(&state, move |db| db.delete_cuark(id, &user_id)).await? {
        warn!("{} could not delete cuark {}", user.username, id);
        return Err(ApiError::NotFound("Cuark not found or unauthorized"));
    }
    Ok(Json(SuccessResponse::ok()))
}

pub async fn like(
    State(state): State<AppState>,
    user: CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let outcome = run_db(&state, move |db| db.like_cuark(&user.id, id)).await?;
    engagement_response(outcome)
}

pub async fn unlike(
    State(state): State<AppState>,
    user: CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    run_db(&state, move |db| db.unlike_cuark(&user.id, id)).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn repost(
    State(state): State<AppState>,
    user: CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let outcome = run_db(&state, move |db| db.repost_cuark(&user.id, id)).await?;
    engagement_response(outcome)
}

pub async fn unrepost(
    State(state): State<AppState>,
    user: CurrentUser,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    run_db(&state, move |db| db.unrepost_cuark(&user.id, id)).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Duplicates succeed silently; only a missing cuark is an error.
fn engagement_response(outcome: InsertOutcome) -> ApiResult<Json<SuccessResponse>> {
    match outcome {
        InsertOutcome::TargetMissing => Err(ApiError::NotFound(NOT_FOUND)),
        _ => Ok(Json(SuccessResponse::ok())),
    }
}
