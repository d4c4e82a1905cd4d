//! OpenAI chat-completions client for reading captured images

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::encode::png_data_url;
use super::{VisionError, VisionModel};

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini-2024-07-18";
const MAX_TOKENS: u32 = 300;
const EXTRACTION_PROMPT: &str = "Extract all time durations, dates, or numeric patterns from this image. \
Return them exactly as they appear, one per line. Focus on time values in H:MM format, \
but also note any other relevant numeric patterns.";

/// Vision API client.
///
/// Cheap to clone; clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new client with the given API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or whitespace-only, or if
    /// the HTTP client fails to build.
    pub fn new(api_key: impl Into<String>) -> Result<Self, VisionError> {
        let api_key = api_key.into();

        if api_key.is_empty() {
            return Err(VisionError::InvalidApiKey {
                reason: "API key cannot be empty",
            });
        }
        if api_key.trim().is_empty() {
            return Err(VisionError::InvalidApiKey {
                reason: "API key cannot be whitespace-only",
            });
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(VisionError::ClientBuild)?;

        Ok(Self {
            http,
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Point the client at a different chat-completions endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Ask the model to transcribe the time values visible in a PNG
    pub async fn describe_png(&self, png: &[u8]) -> Result<Option<String>, VisionError> {
        let request = build_request(&self.model, png);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_api_error(&body).unwrap_or_else(|| VisionError::Api {
                message: format!("status {status}: {body}"),
            }));
        }

        let text = parse_completion(&body)?;
        debug!(chars = text.as_deref().map_or(0, str::len), "vision response received");
        Ok(text)
    }
}

impl VisionModel for Client {
    fn read_image(&self, png: &[u8]) -> impl Future<Output = Result<Option<String>, VisionError>> + Send {
        self.describe_png(png)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn build_request(model: &str, png: &[u8]) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        max_tokens: MAX_TOKENS,
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::Text {
                    text: EXTRACTION_PROMPT.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: png_data_url(png),
                    },
                },
            ],
        }],
    }
}

/// Text of the first choice; a null content is absent text, not an error
fn parse_completion(body: &str) -> Result<Option<String>, VisionError> {
    let payload: ChatResponse =
        serde_json::from_str(body).map_err(|err| VisionError::InvalidResponse(err.to_string()))?;
    let choice = payload
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| VisionError::InvalidResponse("response has no choices".to_string()))?;
    Ok(choice.message.content)
}

fn parse_api_error(body: &str) -> Option<VisionError> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    struct ErrorDetails {
        message: String,
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| VisionError::Api {
            message: payload.error.message,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_rejects_empty_api_key() {
        assert!(matches!(Client::new(""), Err(VisionError::InvalidApiKey { .. })));
        assert!(matches!(Client::new("  "), Err(VisionError::InvalidApiKey { .. })));
    }

    #[test]
    fn test_client_debug_redacts_api_key() {
        let client = Client::new("sk-secret").unwrap().with_model("gpt-test");
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("gpt-test"));
    }

    #[test]
    fn test_request_embeds_prompt_and_image() {
        let json = serde_json::to_value(build_request(DEFAULT_MODEL, &[0xff])).unwrap();
        assert_eq!(json["model"], DEFAULT_MODEL);
        assert_eq!(json["max_tokens"], 300);

        let content = &json["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert!(content[0]["text"].as_str().unwrap().contains("H:MM"));
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,/w==");
    }

    #[test]
    fn test_parse_completion_reads_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"1:30\n2:15"}}]}"#;
        assert_eq!(parse_completion(body).unwrap().as_deref(), Some("1:30\n2:15"));
    }

    #[test]
    fn test_parse_completion_allows_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), None);
    }

    #[test]
    fn test_parse_completion_rejects_missing_choices() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(VisionError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_completion("not-json"),
            Err(VisionError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_api_error_extracts_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let err = parse_api_error(body).unwrap();
        assert_eq!(err.to_string(), "API error: Incorrect API key provided");
        assert!(parse_api_error("<html>").is_none());
    }
}
