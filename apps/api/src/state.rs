use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::anonymizer::AnonymizerClient;
use crate::config::Config;
use crate::quota::QuotaGuard;
use crate::scoring::MatchScorer;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Cloned into every detached processing task, so everything here is either a
/// pooled handle or cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Redis client backing the per-installation license/plan cache.
    pub redis: RedisClient,
    pub anonymizer: AnonymizerClient,
    /// Pluggable match scorer. Production: ClaudeMatchScorer.
    pub scorer: Arc<dyn MatchScorer>,
    pub quota: QuotaGuard,
    pub config: Config,
}
