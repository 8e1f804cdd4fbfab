mod ai_client;
mod analysis;
mod anonymizer;
mod auth;
mod config;
mod db;
mod errors;
mod license;
mod models;
mod quota;
mod routes;
mod scoring;
mod state;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai_client::AiClient;
use crate::analysis::handlers::MAX_FILE_BYTES;
use crate::anonymizer::AnonymizerClient;
use crate::config::Config;
use crate::db::create_pool;
use crate::quota::QuotaGuard;
use crate::routes::build_router;
use crate::scoring::ClaudeMatchScorer;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.rust_log)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting match API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis (license/plan cache)
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize external-service clients
    let anonymizer = AnonymizerClient::new(
        config.anonymizer_url.clone(),
        config.anonymizer_api_key.clone(),
        config.anonymizer_language.clone(),
    );
    info!("Anonymizer client initialized ({})", config.anonymizer_url);

    let ai = AiClient::new(config.anthropic_api_key.clone());
    info!("AI client initialized (model: {})", ai_client::MODEL);

    let scorer = Arc::new(ClaudeMatchScorer::new(ai));
    let quota = QuotaGuard::new(db.clone());

    // Build app state
    let state = AppState {
        db,
        redis,
        anonymizer,
        scorer,
        quota,
        config: config.clone(),
    };

    // Build router. The body limit sits above the per-file cap so oversized
    // uploads reach the handler and get the documented 413.
    let app = build_router(state)
        .layer(DefaultBodyLimit::max(MAX_FILE_BYTES + 2 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
