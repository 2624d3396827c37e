use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    badges::BadgeEvaluator,
    cache::ACTOR_DIRECTORY_KEY,
    data::cities::city_from_campus,
    errors::AppError,
    handlers::{social, stats},
    models::{
        Actor, ActorSearchParams, Badge, BadgeEvaluationResponse, CreateActorRequest, NewActor,
        UpdateCampusRequest,
    },
    AppState,
};

const SEARCH_LIMIT: i64 = 20;

/// Create the actors router, including stats and social sub-routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_actor))
        .route("/search", get(search_actors))
        .route("/:id", get(get_actor))
        .route("/:id/campus", put(update_campus))
        .route("/:id/badges", get(list_badges))
        .route("/:id/badges/evaluate", post(evaluate_badges))
        .merge(stats::router())
        .merge(social::actor_router())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// POST /api/actors - Register an actor (409 when the username is taken)
pub async fn create_actor(
    State(state): State<AppState>,
    Json(payload): Json<CreateActorRequest>,
) -> Result<(StatusCode, Json<Actor>), AppError> {
    payload.validate()?;

    let username = payload.username.trim().to_string();
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest("Username must not contain spaces".to_string()));
    }

    let actor = state
        .store
        .create_actor(NewActor {
            username,
            display_name: blank_to_none(payload.display_name),
            campus: blank_to_none(payload.campus),
            city: blank_to_none(payload.city),
            avatar_url: payload.avatar_url,
        })
        .await?;

    state.cache.invalidate(ACTOR_DIRECTORY_KEY);
    tracing::info!(actor = %actor.id, username = %actor.username, "👤 Actor created");
    Ok((StatusCode::CREATED, Json(actor)))
}

pub async fn get_actor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Actor>, AppError> {
    state
        .store
        .get_actor(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Actor {} not found", id)))
}

/// PUT /api/actors/:id/campus - Set campus and/or city
///
/// When only a campus is given the city is looked up from the campus table.
/// Group membership changes immediately, so the cached directory is dropped.
pub async fn update_campus(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCampusRequest>,
) -> Result<Json<Actor>, AppError> {
    payload.validate()?;

    let campus = blank_to_none(payload.campus);
    let city = blank_to_none(payload.city).or_else(|| {
        campus
            .as_deref()
            .and_then(city_from_campus)
            .map(str::to_string)
    });
    if campus.is_none() && city.is_none() {
        return Err(AppError::BadRequest(
            "Either campus or city must be provided".to_string(),
        ));
    }

    let actor = state
        .store
        .update_location(id, campus, city)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Actor {} not found", id)))?;

    state.cache.invalidate(ACTOR_DIRECTORY_KEY);
    Ok(Json(actor))
}

/// GET /api/actors/search?q= - Find actors by username or display name
pub async fn search_actors(
    State(state): State<AppState>,
    Query(params): Query<ActorSearchParams>,
) -> Result<Json<Vec<Actor>>, AppError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(
        state
            .store
            .search_actors(query, params.exclude, SEARCH_LIMIT)
            .await?,
    ))
}

pub async fn list_badges(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Badge>>, AppError> {
    Ok(Json(state.store.list_badges(id).await?))
}

/// POST /api/actors/:id/badges/evaluate - Grant any milestones now earned
pub async fn evaluate_badges(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BadgeEvaluationResponse>, AppError> {
    if state.store.get_actor(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Actor {} not found", id)));
    }

    let evaluator = BadgeEvaluator::new(state.store.as_ref(), state.config.utc_offset);
    let (granted, longest_streak) = evaluator.evaluate(id).await?;
    Ok(Json(BadgeEvaluationResponse {
        actor_id: id,
        longest_streak,
        granted,
    }))
}
