use axum::http::{header, HeaderValue, Method};
use std::{sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use buzzcheck_backend::{
    app,
    config::{Config, StoreBackend},
    database,
    store::{MemoryStore, PgStore, RestStore, Store},
    AppState,
};

/// Idle time after which a leaderboard client's sequence state is dropped
const SEQUENCER_IDLE: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with reduced SQL verbosity
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("buzzcheck_backend=info,sqlx=warn,info")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match config.backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
            let pool = database::create_pool(database_url).await?;
            database::run_migrations(&pool, config.skip_migrations).await;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Rest => {
            let (url, key) = config
                .rest_url
                .as_deref()
                .zip(config.rest_api_key.as_deref())
                .ok_or_else(|| anyhow::anyhow!("REST_URL and REST_API_KEY must be set"))?;
            Arc::new(RestStore::new(url, key)?)
        }
        StoreBackend::Memory => {
            warn!("⚠️ Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    info!("🗄️  Store backend: {}", config.backend);

    let state = AppState::new(store, config.clone());

    // Forget quiet leaderboard clients and expired cache entries
    let sequencer = state.sequencer.clone();
    let cache = state.cache.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            sequencer.cleanup_idle(SEQUENCER_IDLE);
            cache.cleanup_expired();
        }
    });

    let app = app(state).layer(cors_layer(&config));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Server starting on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Permissive in debug mode, otherwise restricted to ALLOWED_ORIGINS
fn cors_layer(config: &Config) -> CorsLayer {
    let cors = if config.debug_mode {
        info!("🔓 Development mode: Using permissive CORS");
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("⚠️ Ignoring invalid origin '{}': {}", origin, e);
                    None
                }
            })
            .collect();

        if origins.is_empty() {
            warn!("⚠️ No ALLOWED_ORIGINS configured; cross-origin requests will be rejected");
        } else {
            info!("🔒 Production mode: CORS configured for {} origins", origins.len());
            for origin in &origins {
                info!("  - Allowed origin: {:?}", origin);
            }
        }
        CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true)
    };

    cors.allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ])
    .allow_headers([
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        header::ACCEPT,
        header::USER_AGENT,
        header::REFERER,
        header::ORIGIN,
    ])
}
