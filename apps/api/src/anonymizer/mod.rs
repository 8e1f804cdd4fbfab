//! Client for the external PII-redaction service.
//!
//! The service decides the output modality: a JSON payload when text could be
//! extracted and anonymized, or a binary image when the document is a scan
//! that could only be redacted visually. Callers must branch on the response
//! content type, not on what they asked for.
//!
//! No retry here — retry policy belongs to the orchestrator.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AnonymizeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("anonymization service error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("unexpected anonymization payload: {0}")]
    UnexpectedPayload(String),
}

/// Output of the redaction service.
#[derive(Debug, Clone)]
pub enum AnonymizedContent {
    Text {
        text: String,
        original_type: String,
        pii_found: Option<u32>,
    },
    Image {
        data: Vec<u8>,
        mime_type: String,
        original_type: String,
    },
}

#[derive(Debug, Deserialize)]
struct TextPayload {
    #[serde(rename = "type")]
    kind: String,
    original_type: String,
    anonymized_text: String,
    #[serde(default)]
    pii_found: Option<u32>,
}

#[derive(Clone)]
pub struct AnonymizerClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    language: String,
}

impl AnonymizerClient {
    pub fn new(base_url: String, api_key: Option<String>, language: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            language,
        }
    }

    /// Uploads a document for redaction.
    ///
    /// `output_format` is `"text"` (finder mode needs plain text) or `"auto"`
    /// (single mode accepts whatever modality the service produces).
    pub async fn anonymize(
        &self,
        document: Bytes,
        filename: &str,
        output_format: &str,
    ) -> Result<AnonymizedContent, AnonymizeError> {
        let part = reqwest::multipart::Part::bytes(document.to_vec())
            .file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("output_format", output_format.to_string())
            .text("language", self.language.clone());

        let mut request = self
            .client
            .post(format!("{}/anonymize", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnonymizeError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if is_json_content_type(&content_type) {
            let payload: TextPayload = response.json().await?;
            if payload.kind != "text" {
                return Err(AnonymizeError::UnexpectedPayload(format!(
                    "unknown payload type '{}'",
                    payload.kind
                )));
            }
            debug!(
                original_type = %payload.original_type,
                pii_found = ?payload.pii_found,
                "document anonymized to text"
            );
            Ok(AnonymizedContent::Text {
                text: payload.anonymized_text,
                original_type: payload.original_type,
                pii_found: payload.pii_found,
            })
        } else {
            let original_type = response
                .headers()
                .get("x-original-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("image")
                .to_string();
            let data = response.bytes().await?.to_vec();
            debug!(
                mime_type = %content_type,
                size = data.len(),
                "document anonymized to image"
            );
            Ok(AnonymizedContent::Image {
                data,
                mime_type: content_type,
                original_type,
            })
        }
    }
}

fn is_json_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(str::trim)
        .map(|v| v.eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_content_type_with_charset() {
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("application/JSON"));
    }

    #[test]
    fn test_binary_content_types_are_not_json() {
        assert!(!is_json_content_type("image/png"));
        assert!(!is_json_content_type("application/pdf"));
        assert!(!is_json_content_type(""));
    }

    #[test]
    fn test_text_payload_deserializes_with_pii_count() {
        let payload: TextPayload = serde_json::from_str(
            r#"{
                "type": "text",
                "original_type": "pdf_text",
                "anonymized_text": "Experienced <NAME> developer",
                "pii_found": 3
            }"#,
        )
        .unwrap();
        assert_eq!(payload.kind, "text");
        assert_eq!(payload.original_type, "pdf_text");
        assert_eq!(payload.pii_found, Some(3));
    }

    #[test]
    fn test_text_payload_pii_count_is_optional() {
        let payload: TextPayload = serde_json::from_str(
            r#"{"type": "text", "original_type": "docx", "anonymized_text": "abc"}"#,
        )
        .unwrap();
        assert_eq!(payload.pii_found, None);
    }
}
