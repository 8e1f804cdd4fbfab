/// AI client — the single point of entry for all scoring-model calls.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// All model interactions MUST go through this module.
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// The model used for all match-scoring calls.
/// Intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-haiku-4-5-20251001";
const MAX_TOKENS: u32 = 1024;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("model returned empty content")]
    EmptyContent,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentPart<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'a str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    /// Extracts the text content from the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Wraps the Anthropic Messages API with timeout and bounded retry.
///
/// Retries are safe here: scoring is read-only over the submitted document.
#[derive(Clone)]
pub struct AiClient {
    client: Client,
    api_key: String,
}

impl AiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Sends a text-only prompt and returns the model's raw text answer.
    pub async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        self.send(vec![ContentPart::Text { text: prompt }]).await
    }

    /// Sends a prompt with a base64 image attachment ahead of the text block.
    pub async fn complete_with_image(
        &self,
        prompt: &str,
        image_base64: &str,
        media_type: &str,
    ) -> Result<String, AiError> {
        self.send(vec![
            ContentPart::Image {
                source: ImageSource {
                    source_type: "base64",
                    media_type,
                    data: image_base64,
                },
            },
            ContentPart::Text { text: prompt },
        ])
        .await
    }

    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn send(&self, content: Vec<ContentPart<'_>>) -> Result<String, AiError> {
        let request_body = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content,
            }],
        };

        let mut last_error: Option<AiError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "scoring call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(AiError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("scoring API returned {}: {}", status, body);
                last_error = Some(AiError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorBody>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(AiError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: MessagesResponse = response.json().await?;

            debug!(
                "scoring call succeeded: input_tokens={}, output_tokens={}",
                parsed.usage.input_tokens, parsed.usage.output_tokens
            );

            let text = parsed.text().ok_or(AiError::EmptyContent)?;
            return Ok(text.to_string());
        }

        Err(last_error.unwrap_or(AiError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_picks_first_text_block() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{
                "content": [
                    {"type": "thinking", "text": null},
                    {"type": "text", "text": "{\"score\": 80}"}
                ],
                "usage": {"input_tokens": 10, "output_tokens": 5}
            }"#,
        )
        .unwrap();
        assert_eq!(response.text(), Some("{\"score\": 80}"));
    }

    #[test]
    fn test_response_without_text_block_is_none() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content": [], "usage": {"input_tokens": 1, "output_tokens": 0}}"#,
        )
        .unwrap();
        assert_eq!(response.text(), None);
    }

    #[test]
    fn test_image_part_serializes_as_base64_source() {
        let part = ContentPart::Image {
            source: ImageSource {
                source_type: "base64",
                media_type: "image/png",
                data: "aGVsbG8=",
            },
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["source"]["type"], "base64");
        assert_eq!(value["source"]["media_type"], "image/png");
    }

    #[test]
    fn test_text_part_serializes_with_type_tag() {
        let part = ContentPart::Text { text: "hello" };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"], "hello");
    }
}
