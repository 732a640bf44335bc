//! Model backends: one multimodal completion call behind a trait.
//!
//! The pipeline only ever needs one operation, "send these messages and give
//! me the text back". [`ModelBackend`] is that operation; the implementations
//! decide how it travels:
//!
//! | Backend | Transport |
//! |---------|-----------|
//! | [`OpenAiCompatibleBackend`] | `reqwest` → `{base_url}/chat/completions` (Groq by default) |
//! | [`ProviderBackend`] | any `edgequake-llm` provider |
//! | [`MockBackend`] | scripted responses, no network |
//!
//! [`resolve_backend`] picks one from a [`ReportConfig`] exactly once, when
//! the pipeline is built. There is no process-wide credential cache.

pub mod mock;
pub mod openai_compat;
pub mod provider;

pub use mock::MockBackend;
pub use openai_compat::OpenAiCompatibleBackend;
pub use provider::ProviderBackend;

use crate::config::{ReportConfig, API_KEY_ENV};
use crate::error::{DeckReportError, ModelCallError};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Who a message is from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// Base64 image data and its MIME type.
    Image { data: String, mime_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// Concatenated text parts, separated by newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, ContentPart::Image { .. }))
            .count()
    }
}

/// A fully built completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl CompletionRequest {
    pub fn image_count(&self) -> usize {
        self.messages.iter().map(Message::image_count).sum()
    }
}

/// Text returned by the model plus token usage, when the backend reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A multimodal chat-completion endpoint.
///
/// Implementations make exactly one attempt per call.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, ModelCallError>;
}

/// Choose the backend for `config`, from most to least specific.
///
/// 1. **Injected backend** ([`ReportConfig::backend`]), used as-is.
/// 2. **Named provider** ([`ReportConfig::provider_name`]) through
///    `edgequake-llm`, which reads that provider's own API key variable.
/// 3. **Explicit key** ([`ReportConfig::api_key`]) for the OpenAI-compatible
///    endpoint at [`ReportConfig::base_url`].
/// 4. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 5. **`GROQ_API_KEY`** for the OpenAI-compatible endpoint.
pub fn resolve_backend(config: &ReportConfig) -> Result<Arc<dyn ModelBackend>, DeckReportError> {
    if let Some(backend) = &config.backend {
        info!("Using injected backend '{}'", backend.name());
        return Ok(Arc::clone(backend));
    }

    if let Some(name) = &config.provider_name {
        info!("Using edgequake-llm provider '{}'", name);
        return Ok(Arc::new(ProviderBackend::from_factory(name, config.model_id())?));
    }

    if let Some(key) = config.api_key.clone().filter(|k| !k.trim().is_empty()) {
        return http_backend(config, key);
    }

    if let (Ok(provider), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !provider.is_empty() && !model.is_empty() {
            info!("Using edgequake-llm provider '{}' from environment", provider);
            return Ok(Arc::new(ProviderBackend::from_factory(&provider, &model)?));
        }
    }

    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => http_backend(config, key),
        _ => Err(DeckReportError::ProviderNotConfigured {
            provider: config.base_url.clone(),
            hint: format!(
                "No API key found.\n\
                Set {API_KEY_ENV}, pass --api-key, or choose a provider with --provider."
            ),
        }),
    }
}

fn http_backend(config: &ReportConfig, key: String) -> Result<Arc<dyn ModelBackend>, DeckReportError> {
    info!("Using OpenAI-compatible endpoint {}", config.base_url);
    Ok(Arc::new(OpenAiCompatibleBackend::new(
        &config.base_url,
        key,
        config.api_timeout_secs,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_text_skips_images() {
        let m = Message::user(vec![
            ContentPart::Text("one".into()),
            ContentPart::Image {
                data: "AAAA".into(),
                mime_type: "image/jpeg".into(),
            },
            ContentPart::Text("two".into()),
        ]);
        assert_eq!(m.text(), "one\ntwo");
        assert_eq!(m.image_count(), 1);
    }

    #[test]
    fn injected_backend_wins() {
        let mock: Arc<dyn ModelBackend> = Arc::new(MockBackend::new());
        let config = ReportConfig::builder()
            .backend(Arc::clone(&mock))
            .provider_name("openai")
            .api_key("sk-test")
            .build()
            .unwrap();
        let resolved = resolve_backend(&config).unwrap();
        assert_eq!(resolved.name(), "mock");
    }

    #[test]
    fn explicit_key_builds_http_backend() {
        let config = ReportConfig::builder().api_key("gsk-test").build().unwrap();
        let resolved = resolve_backend(&config).unwrap();
        assert_eq!(resolved.name(), "openai-compatible");
    }
}
