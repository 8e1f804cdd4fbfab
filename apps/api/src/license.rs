//! Plan resolution for quota limits.
//!
//! The licensing service is the source of truth for plans; this module only
//! reads its per-installation cache entry (`license:{install_id}`, invalidated
//! externally on license-state webhooks) and falls back to the caller's plan
//! hint. Redis being down must never fail a request.

use redis::AsyncCommands;
use redis::Client as RedisClient;
use tracing::{debug, warn};

use crate::auth::Installation;

/// Ceiling used when no plan is known for the installation.
pub const DEFAULT_MONTHLY_LIMIT: i64 = 100;

const LICENSE_CACHE_TTL_SECS: u64 = 3600;

/// Maps a plan name to its monthly analysis ceiling.
pub fn plan_limit(plan: &str) -> i64 {
    match plan {
        "pro" => 500,
        "business" => 2000,
        _ => DEFAULT_MONTHLY_LIMIT,
    }
}

/// Resolves the monthly analysis limit for an installation.
///
/// Cached plan wins over the header hint; the hint is written back to the
/// cache so subsequent requests skip the header path.
pub async fn monthly_limit(redis: &RedisClient, install: &Installation) -> i64 {
    match cached_plan(redis, &install.install_id).await {
        Ok(Some(plan)) => return plan_limit(&plan),
        Ok(None) => {}
        Err(err) => {
            warn!(
                install_id = %install.install_id,
                error = %err,
                "license cache unavailable, falling back to plan hint"
            );
        }
    }

    if let Some(plan) = install.plan.as_deref() {
        if let Err(err) = cache_plan(redis, &install.install_id, plan).await {
            debug!(install_id = %install.install_id, error = %err, "failed to cache plan");
        }
        return plan_limit(plan);
    }

    DEFAULT_MONTHLY_LIMIT
}

async fn cached_plan(redis: &RedisClient, install_id: &str) -> redis::RedisResult<Option<String>> {
    let mut conn = redis.get_multiplexed_async_connection().await?;
    conn.get(format!("license:{install_id}")).await
}

async fn cache_plan(redis: &RedisClient, install_id: &str, plan: &str) -> redis::RedisResult<()> {
    let mut conn = redis.get_multiplexed_async_connection().await?;
    conn.set_ex(format!("license:{install_id}"), plan, LICENSE_CACHE_TTL_SECS)
        .await
}
