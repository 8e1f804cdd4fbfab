use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of an analysis job.
///
/// `pending` and `processing` are transient; `completed` and `failed` are
/// terminal and exclusive. Persisted as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// One row of `analysis_jobs`. Mutated only by the detached processing task
/// for this job id; `result` holds the serialized match outcome once the job
/// completes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisJobRow {
    pub id: Uuid,
    pub install_id: String,
    pub status: String,
    pub file_type: Option<String>,
    pub result: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Pending).unwrap(),
            r#""pending""#
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Completed).unwrap(),
            r#""completed""#
        );
    }

    #[test]
    fn test_as_str_matches_serde_form() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            let via_serde = serde_json::to_value(status).unwrap();
            assert_eq!(via_serde, serde_json::Value::String(status.as_str().into()));
        }
    }
}
