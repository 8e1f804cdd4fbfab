//! Match scoring — prompt dispatch and response validation.
//!
//! The model answers in free text that is expected to contain a JSON object,
//! optionally wrapped in a fenced code block. Parsing never fails the job:
//! unusable output degrades to a neutral fallback result, scores are clamped,
//! and the category is always re-derived from the clamped score because the
//! model's own category field cannot be trusted.

use std::sync::OnceLock;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::ai_client::{AiClient, AiError};
use crate::models::matching::{
    FinderJob, JobCriteria, JobFinderMatch, JobFinderResult, MatchCategory, MatchDetails,
    MatchResult,
};

pub mod prompts;

/// Neutral score reported when the model's answer could not be parsed.
pub const FALLBACK_SCORE: u8 = 50;
const FALLBACK_MESSAGE: &str = "The analysis could not be fully completed.";

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The match scorer seam. Carried in `AppState` as `Arc<dyn MatchScorer>`;
/// swap implementations without touching handlers or the orchestrator.
///
/// Errors are transport-level only — malformed model output is absorbed into
/// the fallback result, never surfaced.
#[async_trait]
pub trait MatchScorer: Send + Sync {
    async fn score(
        &self,
        anonymized_text: &str,
        criteria: &JobCriteria,
    ) -> Result<MatchResult, AiError>;

    async fn score_with_image(
        &self,
        image: &[u8],
        mime_type: &str,
        criteria: &JobCriteria,
    ) -> Result<MatchResult, AiError>;

    async fn score_against_many(
        &self,
        anonymized_text: &str,
        jobs: &[FinderJob],
        limit: usize,
    ) -> Result<JobFinderResult, AiError>;
}

// ────────────────────────────────────────────────────────────────────────────
// ClaudeMatchScorer — production implementation
// ────────────────────────────────────────────────────────────────────────────

pub struct ClaudeMatchScorer {
    ai: AiClient,
}

impl ClaudeMatchScorer {
    pub fn new(ai: AiClient) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl MatchScorer for ClaudeMatchScorer {
    async fn score(
        &self,
        anonymized_text: &str,
        criteria: &JobCriteria,
    ) -> Result<MatchResult, AiError> {
        let prompt = prompts::build_match_prompt(anonymized_text, criteria, false);
        let raw = self.ai.complete(&prompt).await?;
        Ok(parse_match_response(&raw))
    }

    async fn score_with_image(
        &self,
        image: &[u8],
        mime_type: &str,
        criteria: &JobCriteria,
    ) -> Result<MatchResult, AiError> {
        let prompt = prompts::build_match_prompt("", criteria, true);
        let encoded = BASE64.encode(image);
        let raw = self
            .ai
            .complete_with_image(&prompt, &encoded, mime_type)
            .await?;
        Ok(parse_match_response(&raw))
    }

    async fn score_against_many(
        &self,
        anonymized_text: &str,
        jobs: &[FinderJob],
        limit: usize,
    ) -> Result<JobFinderResult, AiError> {
        let prompt = prompts::build_finder_prompt(anonymized_text, jobs, limit);
        let raw = self.ai.complete(&prompt).await?;
        Ok(parse_finder_response(&raw, limit))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response validation
// ────────────────────────────────────────────────────────────────────────────

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("fence regex is valid"))
}

/// Pulls the JSON candidate out of model prose: the innermost content of a
/// fenced code block if one exists, else the trimmed text itself.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    match fence_regex().captures(trimmed) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim())
            .unwrap_or(trimmed),
        None => trimmed,
    }
}

/// Derives the category bucket from a clamped score.
pub fn score_to_category(score: u8) -> MatchCategory {
    match score {
        0..=40 => MatchCategory::Low,
        41..=70 => MatchCategory::Medium,
        _ => MatchCategory::High,
    }
}

/// Canned message used when the model supplies none.
pub fn default_message(category: MatchCategory) -> &'static str {
    match category {
        MatchCategory::Low => "This position is probably not a match for your profile.",
        MatchCategory::Medium => {
            "You meet some of the requirements. An application could be worthwhile."
        }
        MatchCategory::High => "Your profile is a good match for this position!",
    }
}

/// Coerces the model's score field to an integer in [0, 100].
/// Missing or non-numeric values become 0.
fn clamp_score(value: Option<&Value>) -> u8 {
    let score = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    score.clamp(0.0, 100.0).round() as u8
}

/// Extracts a string array; anything that is not an array of strings is
/// discarded rather than erroring.
fn string_array(value: Option<&Value>) -> Vec<String> {
    match value.and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// The exact result stored when the model's answer is unusable.
pub fn fallback_result() -> MatchResult {
    MatchResult {
        score: FALLBACK_SCORE,
        category: MatchCategory::Medium,
        message: FALLBACK_MESSAGE.to_string(),
        details: None,
    }
}

/// Validates one model answer into a `MatchResult`. Never errors.
pub fn parse_match_response(text: &str) -> MatchResult {
    let candidate = extract_json(text);
    match serde_json::from_str::<Value>(candidate) {
        Ok(data) => match_result_from_value(&data),
        Err(err) => {
            warn!(error = %err, "model response was not valid JSON, using fallback result");
            fallback_result()
        }
    }
}

fn match_result_from_value(data: &Value) -> MatchResult {
    let score = clamp_score(data.get("score"));
    let category = score_to_category(score);
    let message = data
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_message(category).to_string());

    MatchResult {
        score,
        category,
        message,
        details: Some(MatchDetails {
            matched_skills: string_array(data.get("matchedSkills")),
            missing_skills: string_array(data.get("missingSkills")),
            recommendations: string_array(data.get("recommendations")),
        }),
    }
}

/// Validates a multi-posting answer: per-item rules identical to single mode,
/// items without a usable `jobId` dropped, sorted descending by score and
/// truncated to `limit`. An unusable answer degrades to an empty match list.
pub fn parse_finder_response(text: &str, limit: usize) -> JobFinderResult {
    let candidate = extract_json(text);
    let items = match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Array(items)) => items,
        // Tolerate the array being wrapped in an object.
        Ok(Value::Object(mut map)) => match map.remove("matches") {
            Some(Value::Array(items)) => items,
            _ => {
                warn!("finder response was not a JSON array, returning no matches");
                Vec::new()
            }
        },
        Ok(_) => {
            warn!("finder response was not a JSON array, returning no matches");
            Vec::new()
        }
        Err(err) => {
            warn!(error = %err, "finder response was not valid JSON, returning no matches");
            Vec::new()
        }
    };

    let mut matches: Vec<JobFinderMatch> = items
        .iter()
        .filter_map(|item| {
            let job_id = item.get("jobId").and_then(Value::as_i64)?;
            Some(JobFinderMatch {
                job_id,
                result: match_result_from_value(item),
            })
        })
        .collect();

    matches.sort_by(|a, b| b.result.score.cmp(&a.result.score));
    matches.truncate(limit);

    JobFinderResult { matches }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_with_json_fence() {
        let input = "```json\n{\"score\": 85}\n```";
        assert_eq!(extract_json(input), "{\"score\": 85}");
    }

    #[test]
    fn test_extract_json_with_bare_fence() {
        let input = "```\n{\"score\": 85}\n```";
        assert_eq!(extract_json(input), "{\"score\": 85}");
    }

    #[test]
    fn test_extract_json_fence_inside_prose() {
        let input = "Here is my assessment:\n```json\n{\"score\": 85}\n```\nHope that helps!";
        assert_eq!(extract_json(input), "{\"score\": 85}");
    }

    #[test]
    fn test_extract_json_without_fence_trims_only() {
        let input = "  {\"score\": 85}  ";
        assert_eq!(extract_json(input), "{\"score\": 85}");
    }

    #[test]
    fn test_category_thresholds() {
        assert_eq!(score_to_category(0), MatchCategory::Low);
        assert_eq!(score_to_category(40), MatchCategory::Low);
        assert_eq!(score_to_category(41), MatchCategory::Medium);
        assert_eq!(score_to_category(70), MatchCategory::Medium);
        assert_eq!(score_to_category(71), MatchCategory::High);
        assert_eq!(score_to_category(100), MatchCategory::High);
    }

    #[test]
    fn test_model_category_is_overridden_by_score() {
        // The model claims a nonsense category; the score wins.
        let raw = "```json\n{\"score\": 85, \"category\": \"nonsense\", \"message\": \"Strong fit\"}\n```";
        let result = parse_match_response(raw);
        assert_eq!(result.score, 85);
        assert_eq!(result.category, MatchCategory::High);
        assert_eq!(result.message, "Strong fit");
    }

    #[test]
    fn test_unparseable_prose_yields_exact_fallback() {
        let result = parse_match_response("I am sorry, I cannot produce JSON today.");
        assert_eq!(result, fallback_result());
        assert_eq!(result.score, 50);
        assert_eq!(result.category, MatchCategory::Medium);
        assert!(result.details.is_none());
    }

    #[test]
    fn test_score_above_hundred_is_clamped() {
        let result = parse_match_response(r#"{"score": 150}"#);
        assert_eq!(result.score, 100);
        assert_eq!(result.category, MatchCategory::High);
    }

    #[test]
    fn test_negative_score_is_clamped_to_zero() {
        let result = parse_match_response(r#"{"score": -20}"#);
        assert_eq!(result.score, 0);
        assert_eq!(result.category, MatchCategory::Low);
    }

    #[test]
    fn test_missing_score_defaults_to_zero() {
        let result = parse_match_response(r#"{"message": "no score"}"#);
        assert_eq!(result.score, 0);
        assert_eq!(result.category, MatchCategory::Low);
    }

    #[test]
    fn test_non_numeric_score_defaults_to_zero() {
        let result = parse_match_response(r#"{"score": {"value": 80}}"#);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_numeric_string_score_is_coerced() {
        let result = parse_match_response(r#"{"score": "85"}"#);
        assert_eq!(result.score, 85);
        assert_eq!(result.category, MatchCategory::High);
    }

    #[test]
    fn test_missing_message_gets_category_default() {
        let result = parse_match_response(r#"{"score": 90}"#);
        assert_eq!(result.message, default_message(MatchCategory::High));

        let result = parse_match_response(r#"{"score": 10}"#);
        assert_eq!(result.message, default_message(MatchCategory::Low));
    }

    #[test]
    fn test_non_array_details_are_discarded() {
        let raw = r#"{"score": 60, "matchedSkills": "SQL", "missingSkills": null, "recommendations": 3}"#;
        let result = parse_match_response(raw);
        let details = result.details.unwrap();
        assert!(details.matched_skills.is_empty());
        assert!(details.missing_skills.is_empty());
        assert!(details.recommendations.is_empty());
    }

    #[test]
    fn test_details_arrays_keep_only_strings() {
        let raw = r#"{"score": 60, "matchedSkills": ["SQL", 7, null, "Rust"]}"#;
        let result = parse_match_response(raw);
        assert_eq!(
            result.details.unwrap().matched_skills,
            vec!["SQL".to_string(), "Rust".to_string()]
        );
    }

    #[test]
    fn test_finder_matches_sorted_descending_and_truncated() {
        let raw = r#"[
            {"jobId": 1, "score": 10},
            {"jobId": 2, "score": 90},
            {"jobId": 3, "score": 50}
        ]"#;
        let result = parse_finder_response(raw, 2);
        assert_eq!(result.matches.len(), 2);
        assert_eq!(result.matches[0].job_id, 2);
        assert_eq!(result.matches[0].result.score, 90);
        assert_eq!(result.matches[1].job_id, 3);
    }

    #[test]
    fn test_finder_limit_larger_than_items_returns_all() {
        let raw = r#"[{"jobId": 1, "score": 30}, {"jobId": 2, "score": 60}]"#;
        let result = parse_finder_response(raw, 10);
        assert_eq!(result.matches.len(), 2);
        assert_eq!(result.matches[0].job_id, 2);
    }

    #[test]
    fn test_finder_items_without_job_id_are_dropped() {
        let raw = r#"[{"score": 95}, {"jobId": 4, "score": 20}]"#;
        let result = parse_finder_response(raw, 5);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].job_id, 4);
    }

    #[test]
    fn test_finder_items_get_per_item_validation() {
        let raw = r#"[{"jobId": 5, "score": 300, "category": "low"}]"#;
        let result = parse_finder_response(raw, 5);
        assert_eq!(result.matches[0].result.score, 100);
        assert_eq!(result.matches[0].result.category, MatchCategory::High);
    }

    #[test]
    fn test_finder_tolerates_object_wrapper() {
        let raw = r#"{"matches": [{"jobId": 9, "score": 42}]}"#;
        let result = parse_finder_response(raw, 5);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].result.category, MatchCategory::Medium);
    }

    #[test]
    fn test_finder_prose_degrades_to_empty() {
        let result = parse_finder_response("no JSON here", 5);
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_fenced_finder_response_is_unwrapped() {
        let raw = "```json\n[{\"jobId\": 1, \"score\": 75}]\n```";
        let result = parse_finder_response(raw, 5);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].result.category, MatchCategory::High);
    }
}
