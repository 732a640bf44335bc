//! OpenAI-compatible chat completions over `reqwest`.
//!
//! Groq, OpenAI, Together, vLLM and Ollama all accept the same body shape:
//! text parts as `{"type":"text"}` and images as `image_url` data URIs.

use super::{CompletionRequest, CompletionResponse, ContentPart, ModelBackend, Role};
use crate::error::{DeckReportError, ModelCallError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Longest error body kept in a [`ModelCallError`].
const MAX_ERROR_BODY: usize = 500;

pub struct OpenAiCompatibleBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl OpenAiCompatibleBackend {
    pub fn new(base_url: &str, api_key: String, timeout_secs: u64) -> Result<Self, DeckReportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DeckReportError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn to_wire(request: &CompletionRequest) -> ChatRequest<'_> {
    ChatRequest {
        model: &request.model,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        messages: request
            .messages
            .iter()
            .map(|m| WireMessage {
                role: m.role,
                content: m
                    .parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text(text) => WirePart::Text { text },
                        ContentPart::Image { data, mime_type } => WirePart::ImageUrl {
                            image_url: ImageUrl {
                                url: format!("data:{mime_type};base64,{data}"),
                            },
                        },
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Map a non-success status and its body to a call error.
fn status_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> ModelCallError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelCallError::Auth {
            status: status.as_u16(),
            detail: body,
        },
        StatusCode::PAYLOAD_TOO_LARGE => ModelCallError::PayloadTooLarge { detail: body },
        StatusCode::TOO_MANY_REQUESTS => ModelCallError::RateLimited {
            retry_after_secs: retry_after,
        },
        _ => ModelCallError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

fn parse_body(body: &str) -> Result<CompletionResponse, ModelCallError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ModelCallError::InvalidResponse(e.to_string()))?;
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or(ModelCallError::EmptyResponse)?;
    let usage = parsed.usage.unwrap_or(Usage {
        prompt_tokens: 0,
        completion_tokens: 0,
    });
    Ok(CompletionResponse {
        text,
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    })
}

#[async_trait]
impl ModelBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ModelCallError> {
        debug!(
            "POST {} model={} images={} max_tokens={}",
            self.endpoint,
            request.model,
            request.image_count(),
            request.max_tokens
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&to_wire(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelCallError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    ModelCallError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ModelCallError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                ModelCallError::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(status_error(status, retry_after, &body));
        }
        parse_body(&body)
    }
}
