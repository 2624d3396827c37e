use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub mod badges;
pub mod cache;
pub mod config;
pub mod data;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod leaderboard;
pub mod models;
pub mod notifications;
pub mod sequencer;
pub mod store;

use cache::TtlCache;
use config::Config;
use handlers::{actors, checkins, leaderboard as leaderboard_routes, map};
use sequencer::RequestSequencer;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
    pub cache: Arc<TtlCache>,
    pub sequencer: Arc<RequestSequencer>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self {
            cache: Arc::new(TtlCache::new(config.directory_cache_ttl)),
            sequencer: Arc::new(RequestSequencer::new()),
            config: Arc::new(config),
            store,
        }
    }
}

/// All API routes with tracing. CORS is layered on by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/leaderboard", leaderboard_routes::router())
        .nest("/api/checkins", checkins::router())
        .nest("/api/feed", checkins::feed_router())
        .nest("/api/actors", actors::router())
        .nest("/api/map", map::router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "buzzcheck-backend",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.store.backend_name(),
        "cache": state.cache.stats(),
        "tracked_clients": state.sequencer.tracked_clients(),
        "endpoints": {
            "leaderboard": "/api/leaderboard",
            "checkins": "/api/checkins",
            "feed": "/api/feed",
            "actors": "/api/actors",
            "map": "/api/map",
            "health": "/api/health"
        }
    }))
}
