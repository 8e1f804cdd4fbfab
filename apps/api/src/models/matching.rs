//! Wire types for job criteria and match results.
//!
//! Field names follow the consumer plugin's camelCase payloads
//! (`niceToHave`, `matchedSkills`, `applyUrl`).

use serde::{Deserialize, Serialize};

/// Criteria for a single job posting, as submitted with an analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCriteria {
    pub title: String,
    pub description: String,
    /// Must-have requirements. Validated non-empty at submission.
    pub requirements: Vec<String>,
    #[serde(default)]
    pub nice_to_have: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub employment_type: Option<String>,
}

/// One posting in a job-finder request: criteria plus the posting identity
/// so matches can link back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinderJob {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub apply_url: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub nice_to_have: Vec<String>,
}

/// Match strength bucket. Always derived from the score, never taken from
/// the model's own category field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchCategory {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    #[serde(default)]
    pub matched_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Validated outcome of scoring one CV against one posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Always an integer in [0, 100].
    pub score: u8,
    pub category: MatchCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<MatchDetails>,
}

/// One entry of a job-finder result: a match result plus the posting id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFinderMatch {
    pub job_id: i64,
    #[serde(flatten)]
    pub result: MatchResult,
}

/// Ranked job-finder outcome: descending by score, truncated to the
/// requested limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFinderResult {
    pub matches: Vec<JobFinderMatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criteria_accepts_camel_case_payload() {
        let json = r#"{
            "title": "Backend Developer",
            "description": "Build services",
            "requirements": ["SQL", "Rust"],
            "niceToHave": ["Kubernetes"],
            "employmentType": "full-time"
        }"#;
        let criteria: JobCriteria = serde_json::from_str(json).unwrap();
        assert_eq!(criteria.requirements.len(), 2);
        assert_eq!(criteria.nice_to_have, vec!["Kubernetes"]);
        assert_eq!(criteria.employment_type.as_deref(), Some("full-time"));
        assert!(criteria.location.is_none());
    }

    #[test]
    fn test_finder_job_optional_fields_default() {
        let json = r#"{"id": 42, "title": "DevOps Engineer"}"#;
        let job: FinderJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.id, 42);
        assert!(job.requirements.is_empty());
        assert!(job.url.is_none());
    }

    #[test]
    fn test_match_result_omits_absent_details() {
        let result = MatchResult {
            score: 50,
            category: MatchCategory::Medium,
            message: "ok".to_string(),
            details: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("details").is_none());
        assert_eq!(value["category"], "medium");
    }

    #[test]
    fn test_finder_match_flattens_result_fields() {
        let entry = JobFinderMatch {
            job_id: 7,
            result: MatchResult {
                score: 88,
                category: MatchCategory::High,
                message: "fit".to_string(),
                details: Some(MatchDetails::default()),
            },
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["jobId"], 7);
        assert_eq!(value["score"], 88);
        assert_eq!(value["details"]["matchedSkills"], serde_json::json!([]));
    }
}
