use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::{
    errors::AppError,
    leaderboard::service,
    models::{
        ActorLeaderboardParams, ActorLeaderboardResponse, GroupLeaderboardResponse,
        LeaderboardParams,
    },
    AppState,
};

/// Create the leaderboard router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/groups", get(group_leaderboard))
        .route("/groups/:group/actors", get(group_actors))
        .route("/actors", get(actor_leaderboard))
}

/// GET /api/leaderboard/groups - Ranked campuses or cities
///
/// Parameters:
/// - period: week (default), month or year
/// - dimension: campus (default) or city
/// - category: optional drink category filter
/// - client_id / seq: stale-response detection; a superseded request gets 409.
///   Sequences are tracked per client and per board, so this board, the
///   drill-down and the actor board each have their own `seq`.
pub async fn group_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<GroupLeaderboardResponse>, AppError> {
    Ok(Json(service::group_leaderboard(&state, params).await?))
}

/// GET /api/leaderboard/groups/:group/actors - Drill-down into one group
pub async fn group_actors(
    State(state): State<AppState>,
    Path(group): Path<String>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<ActorLeaderboardResponse>, AppError> {
    let group = group.trim();
    if group.is_empty() {
        return Err(AppError::BadRequest("Group name must not be empty".to_string()));
    }
    Ok(Json(service::drill_down(&state, group, params).await?))
}

/// GET /api/leaderboard/actors - Top actors overall, or within `city`
pub async fn actor_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<ActorLeaderboardParams>,
) -> Result<Json<ActorLeaderboardResponse>, AppError> {
    Ok(Json(service::actor_leaderboard(&state, params).await?))
}
