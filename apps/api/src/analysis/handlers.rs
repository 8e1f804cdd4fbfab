//! Axum route handlers for the analysis API.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::analysis::orchestrator::{self, SubmissionInput};
use crate::analysis::store;
use crate::anonymizer::AnonymizedContent;
use crate::auth::Installation;
use crate::errors::AppError;
use crate::models::job::{AnalysisJobRow, JobStatus};
use crate::models::matching::{FinderJob, JobCriteria};
use crate::state::AppState;

/// Upload cap. Larger files are rejected before any job is created.
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_FINDER_LIMIT: i64 = 5;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub anonymized_text: Option<String>,
    #[serde(default)]
    pub anonymized_image: Option<AnonymizedImagePayload>,
    pub job: JobCriteria,
}

#[derive(Debug, Deserialize)]
pub struct AnonymizedImagePayload {
    /// Base64-encoded image bytes.
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub job_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /v1/analysis/upload
///
/// Single-posting analysis of a raw document. Multipart fields: `file`
/// (the document) and `jobData` (JSON criteria). Responds 202 with the job
/// id before the pipeline has run.
pub async fn handle_upload(
    State(state): State<AppState>,
    install: Installation,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let mut file: Option<(Bytes, String, Option<String>)> = None;
    let mut criteria: Option<JobCriteria> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                if bytes.len() > MAX_FILE_BYTES {
                    return Err(AppError::FileTooLarge);
                }
                file = Some((bytes, filename, content_type));
            }
            Some("jobData") => {
                let raw = field.text().await.map_err(bad_multipart)?;
                criteria = Some(parse_criteria(&raw)?);
            }
            _ => {}
        }
    }

    let (bytes, filename, content_type) =
        file.ok_or_else(|| AppError::Validation("file is required".to_string()))?;
    let criteria =
        criteria.ok_or_else(|| AppError::Validation("jobData is required".to_string()))?;

    let job_id = orchestrator::submit_single(
        &state,
        &install,
        SubmissionInput::Document {
            bytes,
            filename,
            content_type,
        },
        criteria,
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(submit_response(job_id))))
}

/// POST /v1/analysis/start
///
/// Single-posting analysis of content the caller already anonymized —
/// skips the redaction stage entirely.
pub async fn handle_start(
    State(state): State<AppState>,
    install: Installation,
    Json(request): Json<StartRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let content = match (request.anonymized_text, request.anonymized_image) {
        (Some(text), None) => AnonymizedContent::Text {
            text,
            original_type: "text".to_string(),
            pii_found: None,
        },
        (None, Some(image)) => {
            let data = BASE64.decode(image.data.as_bytes()).map_err(|_| {
                AppError::Validation("anonymized_image.data must be valid base64".to_string())
            })?;
            AnonymizedContent::Image {
                data,
                mime_type: image.mime_type,
                original_type: "image".to_string(),
            }
        }
        _ => {
            return Err(AppError::Validation(
                "exactly one of anonymized_text or anonymized_image is required".to_string(),
            ))
        }
    };

    let job_id = orchestrator::submit_single(
        &state,
        &install,
        SubmissionInput::Anonymized(content),
        request.job,
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(submit_response(job_id))))
}

/// POST /v1/analysis/job-finder
///
/// Multi-posting analysis: one CV against many postings. Multipart fields:
/// `file`, `jobs` (JSON array), optional `limit`.
pub async fn handle_job_finder(
    State(state): State<AppState>,
    install: Installation,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let mut file: Option<(Bytes, String, Option<String>)> = None;
    let mut jobs: Option<Vec<FinderJob>> = None;
    let mut limit: Option<i64> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                if bytes.len() > MAX_FILE_BYTES {
                    return Err(AppError::FileTooLarge);
                }
                file = Some((bytes, filename, content_type));
            }
            Some("jobs") => {
                let raw = field.text().await.map_err(bad_multipart)?;
                jobs = Some(serde_json::from_str(&raw).map_err(|e| {
                    AppError::Validation(format!("jobs must be a valid JSON array: {e}"))
                })?);
            }
            Some("limit") => {
                let raw = field.text().await.map_err(bad_multipart)?;
                limit = raw.trim().parse::<i64>().ok();
            }
            _ => {}
        }
    }

    let (bytes, filename, content_type) =
        file.ok_or_else(|| AppError::Validation("file is required".to_string()))?;
    let jobs = jobs.ok_or_else(|| AppError::Validation("jobs is required".to_string()))?;
    let limit = clamp_finder_limit(limit);

    let job_id = orchestrator::submit_finder(
        &state, &install, bytes, filename, content_type, jobs, limit,
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(submit_response(job_id))))
}

/// GET /v1/analysis/:id
///
/// Read-only projection over the job store. Unknown ids and jobs owned by a
/// different installation both answer 404.
pub async fn handle_get_status(
    State(state): State<AppState>,
    install: Installation,
    Path(job_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, AppError> {
    let row = store::get(&state.db, job_id, &install.install_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Analysis job not found".to_string()))?;

    Ok(Json(status_response(&row)))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("invalid multipart body: {err}"))
}

fn parse_criteria(raw: &str) -> Result<JobCriteria, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Validation(format!("jobData must be valid JSON: {e}")))
}

fn submit_response(job_id: Uuid) -> SubmitResponse {
    SubmitResponse {
        job_id,
        status: JobStatus::Pending,
        message: format!(
            "Analysis started. Use GET /v1/analysis/{job_id} to check status."
        ),
    }
}

/// Finder result count: default 5, clamped to 1..=10.
fn clamp_finder_limit(raw: Option<i64>) -> usize {
    raw.unwrap_or(DEFAULT_FINDER_LIMIT).clamp(1, 10) as usize
}

/// Builds the polling response. `result` appears only for completed jobs,
/// `error` only for failed ones, never both.
pub(crate) fn status_response(row: &AnalysisJobRow) -> StatusResponse {
    let mut response = StatusResponse {
        job_id: row.id,
        status: row.status.clone(),
        created_at: row.created_at,
        result: None,
        completed_at: None,
        error: None,
    };

    if row.status == JobStatus::Completed.as_str() {
        response.result = row.result.clone();
        response.completed_at = row.completed_at;
    } else if row.status == JobStatus::Failed.as_str() {
        response.error = row.error_message.clone();
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_row(status: JobStatus) -> AnalysisJobRow {
        let now = Utc::now();
        AnalysisJobRow {
            id: Uuid::new_v4(),
            install_id: "install-1".to_string(),
            status: status.as_str().to_string(),
            file_type: Some("application/pdf".to_string()),
            result: Some(json!({"score": 85, "category": "high"})),
            error_message: Some("anonymizing document: service error".to_string()),
            created_at: now,
            started_at: Some(now),
            completed_at: Some(now),
        }
    }

    #[test]
    fn test_pending_status_has_neither_result_nor_error() {
        let response = status_response(&make_row(JobStatus::Pending));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "pending");
        assert!(value.get("result").is_none());
        assert!(value.get("error").is_none());
        assert!(value.get("completed_at").is_none());
    }

    #[test]
    fn test_processing_status_has_neither_result_nor_error() {
        let response = status_response(&make_row(JobStatus::Processing));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "processing");
        assert!(value.get("result").is_none());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_completed_status_exposes_result_not_error() {
        let response = status_response(&make_row(JobStatus::Completed));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["result"]["score"], 85);
        assert!(value.get("completed_at").is_some());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_failed_status_exposes_error_not_result() {
        let response = status_response(&make_row(JobStatus::Failed));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(value.get("result").is_none());
        assert!(value.get("completed_at").is_none());
        assert!(value["error"].as_str().unwrap().contains("anonymizing"));
    }

    #[test]
    fn test_finder_limit_defaults_to_five() {
        assert_eq!(clamp_finder_limit(None), 5);
    }

    #[test]
    fn test_finder_limit_is_clamped_to_one_through_ten() {
        assert_eq!(clamp_finder_limit(Some(0)), 1);
        assert_eq!(clamp_finder_limit(Some(-3)), 1);
        assert_eq!(clamp_finder_limit(Some(10)), 10);
        assert_eq!(clamp_finder_limit(Some(50)), 10);
        assert_eq!(clamp_finder_limit(Some(3)), 3);
    }

    #[test]
    fn test_submit_response_points_at_status_endpoint() {
        let job_id = Uuid::new_v4();
        let response = submit_response(job_id);
        assert_eq!(response.status, JobStatus::Pending);
        assert!(response.message.contains(&job_id.to_string()));
    }
}
