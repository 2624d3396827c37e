use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    errors::AppError,
    models::{Actor, Notification, NotificationParams, ToggleResponse, UnreadCountResponse},
    AppState,
};

const DEFAULT_NOTIFICATION_LIMIT: i64 = 50;

/// Follow and notification routes, merged into the actors router
pub fn actor_router() -> Router<AppState> {
    Router::new()
        .route("/:id/follow/:target", post(follow).delete(unfollow))
        .route("/:id/following", get(following))
        .route("/:id/followers", get(followers))
        .route("/:id/notifications", get(list_notifications))
        .route("/:id/notifications/unread", get(unread_count))
        .route("/:id/notifications/read", post(mark_all_read))
}

async fn require_actor(state: &AppState, id: Uuid) -> Result<Actor, AppError> {
    state
        .store
        .get_actor(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Actor {} not found", id)))
}

/// POST /api/actors/:id/follow/:target
pub async fn follow(
    State(state): State<AppState>,
    Path((id, target)): Path<(Uuid, Uuid)>,
) -> Result<Json<ToggleResponse>, AppError> {
    if id == target {
        return Err(AppError::BadRequest("Actors cannot follow themselves".to_string()));
    }
    require_actor(&state, id).await?;
    require_actor(&state, target).await?;

    let changed = state.store.follow(id, target).await?;
    Ok(Json(ToggleResponse { active: true, changed }))
}

/// DELETE /api/actors/:id/follow/:target
pub async fn unfollow(
    State(state): State<AppState>,
    Path((id, target)): Path<(Uuid, Uuid)>,
) -> Result<Json<ToggleResponse>, AppError> {
    let changed = state.store.unfollow(id, target).await?;
    Ok(Json(ToggleResponse { active: false, changed }))
}

pub async fn following(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Actor>>, AppError> {
    let ids = state.store.following_ids(id).await?;
    Ok(Json(state.store.list_actors(Some(&ids)).await?))
}

pub async fn followers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Actor>>, AppError> {
    let ids = state.store.follower_ids(id).await?;
    Ok(Json(state.store.list_actors(Some(&ids)).await?))
}

/// POST /api/checkins/:id/like/:actor
pub async fn like(
    State(state): State<AppState>,
    Path((check_in_id, actor_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ToggleResponse>, AppError> {
    if state.store.get_check_in(check_in_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Check-in {} not found", check_in_id)));
    }
    require_actor(&state, actor_id).await?;

    let changed = state.store.like(actor_id, check_in_id).await?;
    Ok(Json(ToggleResponse { active: true, changed }))
}

/// DELETE /api/checkins/:id/like/:actor
pub async fn unlike(
    State(state): State<AppState>,
    Path((check_in_id, actor_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ToggleResponse>, AppError> {
    let changed = state.store.unlike(actor_id, check_in_id).await?;
    Ok(Json(ToggleResponse { active: false, changed }))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<NotificationParams>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_NOTIFICATION_LIMIT).clamp(1, 200);
    Ok(Json(state.store.list_notifications(id, limit).await?))
}

/// GET /api/actors/:id/notifications/unread
///
/// Count failures read as zero unread, so a badge counter never breaks the client.
pub async fn unread_count(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Json<UnreadCountResponse> {
    let unread = state.store.unread_count(id).await.unwrap_or_else(|e| {
        tracing::warn!("⚠️ Unread count failed for {}: {}", id, e);
        0
    });
    Json(UnreadCountResponse { actor_id: id, unread })
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let updated = state.store.mark_all_read(id).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}
