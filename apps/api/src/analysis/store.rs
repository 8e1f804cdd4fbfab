//! Persistence for analysis jobs.
//!
//! Transitions are one-directional: pending → processing → completed|failed.
//! Both terminal writes set `completed_at` and are guarded on
//! `completed_at IS NULL`, so a terminal state is write-once.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::job::{AnalysisJobRow, JobStatus};

/// Creates a job in state `pending` and returns its id.
pub async fn create(
    db: &PgPool,
    install_id: &str,
    file_type: Option<&str>,
) -> Result<Uuid, sqlx::Error> {
    let job_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO analysis_jobs (id, install_id, status, file_type, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(job_id)
    .bind(install_id)
    .bind(JobStatus::Pending.as_str())
    .bind(file_type)
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok(job_id)
}

pub async fn mark_processing(db: &PgPool, job_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE analysis_jobs SET status = $2, started_at = $3 WHERE id = $1 AND completed_at IS NULL",
    )
    .bind(job_id)
    .bind(JobStatus::Processing.as_str())
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok(())
}

pub async fn mark_completed(db: &PgPool, job_id: Uuid, result: &Value) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE analysis_jobs
        SET status = $2, result = $3, completed_at = $4
        WHERE id = $1 AND completed_at IS NULL
        "#,
    )
    .bind(job_id)
    .bind(JobStatus::Completed.as_str())
    .bind(result)
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok(())
}

pub async fn mark_failed(db: &PgPool, job_id: Uuid, error_message: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE analysis_jobs
        SET status = $2, error_message = $3, completed_at = $4
        WHERE id = $1 AND completed_at IS NULL
        "#,
    )
    .bind(job_id)
    .bind(JobStatus::Failed.as_str())
    .bind(error_message)
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok(())
}

/// Fetches a job scoped by both id and owning installation. A job belonging
/// to another tenant is indistinguishable from a missing one.
pub async fn get(
    db: &PgPool,
    job_id: Uuid,
    install_id: &str,
) -> Result<Option<AnalysisJobRow>, sqlx::Error> {
    sqlx::query_as::<_, AnalysisJobRow>(
        "SELECT * FROM analysis_jobs WHERE id = $1 AND install_id = $2",
    )
    .bind(job_id)
    .bind(install_id)
    .fetch_optional(db)
    .await
}
