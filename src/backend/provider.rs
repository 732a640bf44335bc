//! Adapter from [`ModelBackend`] to an `edgequake-llm` provider.
//!
//! Lets the pipeline run against OpenAI, Anthropic, Gemini, Ollama and the
//! rest of the providers `edgequake-llm` knows, using their own API key
//! variables (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, ...).

use super::{CompletionRequest, CompletionResponse, ContentPart, Message, ModelBackend, Role};
use crate::error::{DeckReportError, ModelCallError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Build `provider_name` with `model` through [`ProviderFactory`].
    pub fn from_factory(provider_name: &str, model: &str) -> Result<Self, DeckReportError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            DeckReportError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, provider_name))
    }
}

/// Text parts joined by newlines, and image parts as `ImageData`.
fn split_parts(message: &Message) -> (String, Vec<ImageData>) {
    let images = message
        .parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::Image { data, mime_type } => {
                Some(ImageData::new(data.clone(), mime_type.as_str()).with_detail("high"))
            }
            ContentPart::Text(_) => None,
        })
        .collect();
    (message.text(), images)
}

fn to_chat_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
    request
        .messages
        .iter()
        .map(|m| {
            let (text, images) = split_parts(m);
            match m.role {
                Role::System => ChatMessage::system(text.as_str()),
                Role::User => ChatMessage::user_with_images(text.as_str(), images),
            }
        })
        .collect()
}

#[async_trait]
impl ModelBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ModelCallError> {
        let messages = to_chat_messages(request);
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ModelCallError::Provider(format!("{e}")))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(ModelCallError::EmptyResponse);
        }
        Ok(CompletionResponse {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}
