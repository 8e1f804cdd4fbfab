//! Job orchestration: validate, gate on quota, create the job row, then
//! detach the processing pipeline from the request/response cycle.
//!
//! Detachment is an explicit `tokio::spawn` holding a cloned `AppState`; the
//! 202 response never waits on it. Exactly one task is spawned per job id,
//! so every job row has a single writer. Quota is consumed on success only:
//! the increment runs after `mark_completed`, and any pipeline error lands in
//! `mark_failed` without touching the usage record.

use anyhow::Context;
use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::store;
use crate::anonymizer::AnonymizedContent;
use crate::auth::Installation;
use crate::errors::AppError;
use crate::license;
use crate::models::matching::{FinderJob, JobCriteria};
use crate::state::AppState;

/// Input for a single-posting analysis: a raw document to anonymize, or
/// content the caller already anonymized.
pub enum SubmissionInput {
    Document {
        bytes: Bytes,
        filename: String,
        content_type: Option<String>,
    },
    Anonymized(AnonymizedContent),
}

impl SubmissionInput {
    fn file_type(&self) -> Option<&str> {
        match self {
            SubmissionInput::Document { content_type, .. } => content_type.as_deref(),
            SubmissionInput::Anonymized(_) => None,
        }
    }
}

/// Accepts a single-posting analysis. Returns the job id once the row exists
/// and the pipeline task is scheduled; the job is still `pending` at that
/// point.
pub async fn submit_single(
    state: &AppState,
    install: &Installation,
    input: SubmissionInput,
    criteria: JobCriteria,
) -> Result<Uuid, AppError> {
    if criteria.requirements.is_empty() {
        return Err(AppError::Validation(
            "jobData.requirements must not be empty".to_string(),
        ));
    }

    let job_id = reserve_and_create(state, install, input.file_type()).await?;
    info!(%job_id, install_id = %install.install_id, "analysis job accepted");

    let task_state = state.clone();
    let install_id = install.install_id.clone();
    tokio::spawn(async move {
        let outcome = run_single(&task_state, job_id, input, &criteria).await;
        finalize(&task_state, job_id, &install_id, outcome).await;
    });

    Ok(job_id)
}

/// Accepts a job-finder analysis (one CV against many postings).
pub async fn submit_finder(
    state: &AppState,
    install: &Installation,
    document: Bytes,
    filename: String,
    content_type: Option<String>,
    jobs: Vec<FinderJob>,
    limit: usize,
) -> Result<Uuid, AppError> {
    if jobs.is_empty() {
        return Err(AppError::NoJobs);
    }

    let job_id = reserve_and_create(state, install, content_type.as_deref()).await?;
    info!(
        %job_id,
        install_id = %install.install_id,
        postings = jobs.len(),
        "job finder analysis accepted"
    );

    let task_state = state.clone();
    let install_id = install.install_id.clone();
    tokio::spawn(async move {
        let outcome = run_finder(&task_state, job_id, document, &filename, &jobs, limit).await;
        finalize(&task_state, job_id, &install_id, outcome).await;
    });

    Ok(job_id)
}

/// Quota gate + job row creation, shared by both modes. No job row is
/// created when the tenant is over quota.
async fn reserve_and_create(
    state: &AppState,
    install: &Installation,
    file_type: Option<&str>,
) -> Result<Uuid, AppError> {
    let monthly_limit = license::monthly_limit(&state.redis, install).await;
    let allowed = state
        .quota
        .check_and_reserve(&install.install_id, install.site_url.as_deref(), monthly_limit)
        .await;
    if !allowed {
        return Err(AppError::QuotaExceeded);
    }

    Ok(store::create(&state.db, &install.install_id, file_type).await?)
}

/// Terminal bookkeeping for a detached pipeline. Runs after the HTTP
/// response is long gone, so errors here can only be logged.
async fn finalize(state: &AppState, job_id: Uuid, install_id: &str, outcome: anyhow::Result<()>) {
    match outcome {
        Ok(()) => {
            info!(%job_id, "analysis job completed");
            if let Err(err) = state.quota.increment(install_id).await {
                error!(%job_id, %install_id, error = %err, "failed to record usage for completed job");
            }
        }
        Err(err) => {
            let message = format!("{err:#}");
            warn!(%job_id, error = %message, "analysis job failed");
            if let Err(db_err) = store::mark_failed(&state.db, job_id, &message).await {
                error!(%job_id, error = %db_err, "failed to persist job failure");
            }
        }
    }
}

async fn run_single(
    state: &AppState,
    job_id: Uuid,
    input: SubmissionInput,
    criteria: &JobCriteria,
) -> anyhow::Result<()> {
    store::mark_processing(&state.db, job_id)
        .await
        .context("marking job processing")?;

    let content = match input {
        SubmissionInput::Document {
            bytes, filename, ..
        } => state
            .anonymizer
            .anonymize(bytes, &filename, "auto")
            .await
            .context("anonymizing document")?,
        SubmissionInput::Anonymized(content) => content,
    };

    let result = match content {
        AnonymizedContent::Text { text, .. } => {
            if text.trim().is_empty() {
                anyhow::bail!("anonymization produced no text");
            }
            state
                .scorer
                .score(&text, criteria)
                .await
                .context("scoring anonymized text")?
        }
        AnonymizedContent::Image {
            data, mime_type, ..
        } => state
            .scorer
            .score_with_image(&data, &mime_type, criteria)
            .await
            .context("scoring anonymized image")?,
    };

    let value = serde_json::to_value(&result).context("serializing match result")?;
    store::mark_completed(&state.db, job_id, &value)
        .await
        .context("persisting result")?;

    Ok(())
}

async fn run_finder(
    state: &AppState,
    job_id: Uuid,
    document: Bytes,
    filename: &str,
    jobs: &[FinderJob],
    limit: usize,
) -> anyhow::Result<()> {
    store::mark_processing(&state.db, job_id)
        .await
        .context("marking job processing")?;

    // Finder mode needs plain text to embed in the multi-posting prompt.
    let content = state
        .anonymizer
        .anonymize(document, filename, "text")
        .await
        .context("anonymizing document")?;

    let text = match content {
        AnonymizedContent::Text { text, .. } if !text.trim().is_empty() => text,
        _ => anyhow::bail!("anonymization produced no text"),
    };

    let result = state
        .scorer
        .score_against_many(&text, jobs, limit)
        .await
        .context("scoring against job postings")?;

    let value = serde_json::to_value(&result).context("serializing finder result")?;
    store::mark_completed(&state.db, job_id, &value)
        .await
        .context("persisting result")?;

    Ok(())
}
