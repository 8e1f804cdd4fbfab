//! Monthly per-installation usage quota.
//!
//! Checking and incrementing are deliberately separated: the check happens at
//! submission, the increment only after a job completes, so a failed analysis
//! never consumes the tenant's allowance. Two concurrent submissions can both
//! pass the check when one slot remains — this is an accepted soft-limit
//! semantic, not a hard cap.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;

#[derive(Clone)]
pub struct QuotaGuard {
    db: PgPool,
}

impl QuotaGuard {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Returns whether the installation still has quota this month.
    ///
    /// Lazily creates the usage record for `(install_id, current month)` with
    /// the plan-derived limit. Does NOT increment. Fails closed: if the usage
    /// store is unreachable the submission is rejected as over quota.
    pub async fn check_and_reserve(
        &self,
        install_id: &str,
        site_url: Option<&str>,
        monthly_limit: i64,
    ) -> bool {
        match self.usage_allows(install_id, site_url, monthly_limit).await {
            Ok(allowed) => allowed,
            Err(err) => {
                warn!(%install_id, error = %err, "usage store unavailable, failing closed");
                false
            }
        }
    }

    async fn usage_allows(
        &self,
        install_id: &str,
        site_url: Option<&str>,
        monthly_limit: i64,
    ) -> Result<bool, sqlx::Error> {
        let month = month_key(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO usage_records (install_id, month, site_url, count, monthly_limit)
            VALUES ($1, $2, $3, 0, $4)
            ON CONFLICT (install_id, month) DO NOTHING
            "#,
        )
        .bind(install_id)
        .bind(&month)
        .bind(site_url)
        .bind(monthly_limit)
        .execute(&self.db)
        .await?;

        let (count, limit): (i64, i64) = sqlx::query_as(
            "SELECT count, monthly_limit FROM usage_records WHERE install_id = $1 AND month = $2",
        )
        .bind(install_id)
        .bind(&month)
        .fetch_one(&self.db)
        .await?;

        Ok(count < limit)
    }

    /// Records one completed analysis. Additive at the storage layer so
    /// concurrent completions for the same tenant never lose updates.
    pub async fn increment(&self, install_id: &str) -> Result<(), sqlx::Error> {
        let month = month_key(Utc::now());

        let result = sqlx::query(
            "UPDATE usage_records SET count = count + 1 WHERE install_id = $1 AND month = $2",
        )
        .bind(install_id)
        .bind(&month)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            // The record is created by check_and_reserve; missing here means
            // the job straddled a month boundary.
            warn!(%install_id, %month, "usage increment found no record for this month");
        }

        Ok(())
    }
}

/// Calendar-month key in the processing clock: `YYYY-MM`.
pub fn month_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}
