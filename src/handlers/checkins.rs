use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use validator::Validate;

use crate::{
    badges::BadgeEvaluator,
    data::cities::city_from_campus,
    errors::AppError,
    handlers::social,
    models::{
        ActorSummary, CheckIn, CheckInCreatedResponse, CheckInQuery, CreateCheckInRequest, FeedItem,
        FeedMode, FeedParams, Visibility,
    },
    notifications::maybe_smack_talk,
    AppState,
};

const DEFAULT_FEED_LIMIT: i64 = 50;
const MAX_FEED_LIMIT: i64 = 200;

/// Routes nested under /api/checkins
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_check_in))
        .route("/:id/like/:actor", post(social::like).delete(social::unlike))
}

/// Routes nested under /api/feed
pub fn feed_router() -> Router<AppState> {
    Router::new().route("/", get(get_feed))
}

/// POST /api/checkins - Record a check-in
///
/// The city is copied from the actor (or derived from their campus) at
/// submit time. Milestones are evaluated right after the insert; a failure
/// there is logged and does not fail the check-in.
pub async fn create_check_in(
    State(state): State<AppState>,
    Json(payload): Json<CreateCheckInRequest>,
) -> Result<(StatusCode, Json<CheckInCreatedResponse>), AppError> {
    payload.validate()?;

    let actor = state
        .store
        .get_actor(payload.actor_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Actor {} not found", payload.actor_id)))?;

    let city = actor
        .city
        .clone()
        .filter(|c| !c.trim().is_empty())
        .or_else(|| {
            actor
                .campus
                .as_deref()
                .and_then(city_from_campus)
                .map(str::to_string)
        });

    let check_in = state
        .store
        .insert_check_in(payload.into_new_check_in(city, Utc::now()))
        .await?;
    tracing::info!(
        actor = %actor.id,
        category = %check_in.category,
        private = check_in.is_private,
        "🥤 Check-in recorded"
    );

    let evaluator = BadgeEvaluator::new(state.store.as_ref(), state.config.utc_offset);
    let new_badges = match evaluator.evaluate(actor.id).await {
        Ok((granted, _)) => granted,
        Err(e) => {
            tracing::warn!("⚠️ Milestone evaluation failed for {}: {}", actor.id, e);
            Vec::new()
        }
    };

    if let Err(e) = maybe_smack_talk(state.store.as_ref(), &actor, state.config.smack_talk_chance).await {
        tracing::warn!("⚠️ Failed to send smack talk for {}: {}", actor.id, e);
    }

    Ok((
        StatusCode::CREATED,
        Json(CheckInCreatedResponse { check_in, new_badges }),
    ))
}

/// GET /api/feed - Newest check-ins with author and like information
///
/// Parameters:
/// - viewer_id: the reading actor; their own private check-ins are included
/// - mode: everyone (default) or following (requires viewer_id; includes the viewer)
/// - limit: page size, default 50
pub async fn get_feed(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<Vec<FeedItem>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .clamp(1, MAX_FEED_LIMIT);

    let actor_ids = match params.mode.unwrap_or(FeedMode::Everyone) {
        FeedMode::Everyone => None,
        FeedMode::Following => {
            let viewer = params.viewer_id.ok_or_else(|| {
                AppError::BadRequest("viewer_id is required for the following feed".to_string())
            })?;
            let mut ids = state.store.following_ids(viewer).await?;
            ids.push(viewer);
            Some(ids)
        }
    };

    let mut check_ins = state
        .store
        .list_check_ins(&CheckInQuery {
            actor_ids,
            public_only: true,
            newest_first: true,
            limit: Some(limit),
            ..CheckInQuery::default()
        })
        .await?;

    // Private check-ins only ever reach their own author.
    if let Some(viewer) = params.viewer_id {
        let own_private = state
            .store
            .list_check_ins(&CheckInQuery {
                actor_ids: Some(vec![viewer]),
                newest_first: true,
                limit: Some(limit),
                ..CheckInQuery::default()
            })
            .await?;
        check_ins.extend(
            own_private
                .into_iter()
                .filter(|c| c.visibility() == Visibility::Private),
        );
        check_ins.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        check_ins.truncate(limit as usize);
    }

    Ok(Json(enrich(&state, check_ins, params.viewer_id).await?))
}

async fn enrich(
    state: &AppState,
    check_ins: Vec<CheckIn>,
    viewer: Option<Uuid>,
) -> Result<Vec<FeedItem>, AppError> {
    if check_ins.is_empty() {
        return Ok(Vec::new());
    }

    let author_ids: Vec<Uuid> = check_ins
        .iter()
        .map(|c| c.actor_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let authors: HashMap<Uuid, ActorSummary> = state
        .store
        .list_actors(Some(&author_ids))
        .await?
        .into_iter()
        .map(|a| (a.id, a.summary()))
        .collect();

    let check_in_ids: Vec<Uuid> = check_ins.iter().map(|c| c.id).collect();
    let mut like_counts: HashMap<Uuid, i64> = HashMap::new();
    let mut liked_by_viewer: HashSet<Uuid> = HashSet::new();
    for like in state.store.likes_for(&check_in_ids).await? {
        *like_counts.entry(like.check_in_id).or_default() += 1;
        if Some(like.actor_id) == viewer {
            liked_by_viewer.insert(like.check_in_id);
        }
    }

    Ok(check_ins
        .into_iter()
        .map(|check_in| FeedItem {
            author: authors
                .get(&check_in.actor_id)
                .cloned()
                .unwrap_or_else(|| ActorSummary::unknown(check_in.actor_id)),
            like_count: like_counts.get(&check_in.id).copied().unwrap_or(0),
            liked_by_viewer: liked_by_viewer.contains(&check_in.id),
            check_in,
        })
        .collect())
}
