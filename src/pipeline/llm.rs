//! Analysis client: build one stage request and call the backend once.
//!
//! All prompt wording lives in [`crate::prompts`]; this module only decides
//! what goes into a request and turns the outcome into a [`StageResult`].
//!
//! ## Request layout
//!
//! A single user message whose parts are, in order:
//! 1. the stage instruction
//! 2. `=== PRIOR FINDINGS ===` block, when prior context is non-empty
//! 3. `=== TABLE DATA ===` block, when table text is non-empty, cut at the
//!    stage's table ceiling
//! 4. up to `max_images` images from the front of the slice
//!
//! ## No retries
//!
//! A failed call is reported once and the stage counts as having produced
//! nothing. Whether that is fatal is the assembler's decision.

use crate::backend::{CompletionRequest, ContentPart, Message, ModelBackend};
use crate::config::ReportConfig;
use crate::error::ModelCallError;
use crate::pipeline::extract::ExtractedImage;
use crate::pipeline::table::truncate_chars;
use crate::prompts::{self, PRIOR_FINDINGS_LABEL, TABLE_DATA_LABEL};
use crate::stage::AnalysisStage;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of one model call.
///
/// Never an `Err`: a failed call has `text: None` and the reason in `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    pub stage: AnalysisStage,
    /// 1-indexed batch number for Initial calls.
    pub batch: Option<usize>,
    pub text: Option<String>,
    pub error: Option<ModelCallError>,
    pub images_sent: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
}

impl StageResult {
    pub fn succeeded(&self) -> bool {
        self.text.is_some()
    }

    /// Error message, or an empty string on success.
    pub fn error_message(&self) -> String {
        self.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }
}

/// Sends stage requests through a [`ModelBackend`].
pub struct AnalysisClient<'a> {
    backend: &'a dyn ModelBackend,
    config: &'a ReportConfig,
}

impl<'a> AnalysisClient<'a> {
    pub fn new(backend: &'a dyn ModelBackend, config: &'a ReportConfig) -> Self {
        Self { backend, config }
    }

    /// Run `stage` once over `images`, `table_text` and `prior_context`.
    pub async fn analyze(
        &self,
        stage: AnalysisStage,
        images: &[&ExtractedImage],
        table_text: &str,
        prior_context: &str,
    ) -> StageResult {
        let request = build_request(stage, images, table_text, prior_context, self.config);
        let images_sent = request.image_count();
        debug!(
            "{} request: {} image(s), {} char(s) of text, max_tokens={}",
            stage,
            images_sent,
            request.messages.iter().map(|m| m.text().len()).sum::<usize>(),
            request.max_tokens
        );

        let start = Instant::now();
        let outcome = self
            .backend
            .complete(&request)
            .await
            .and_then(|response| {
                if response.text.trim().is_empty() {
                    Err(ModelCallError::EmptyResponse)
                } else {
                    Ok(response)
                }
            });
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {}ms",
                    stage, response.input_tokens, response.output_tokens, duration_ms
                );
                StageResult {
                    stage,
                    batch: None,
                    text: Some(response.text),
                    error: None,
                    images_sent,
                    input_tokens: response.input_tokens,
                    output_tokens: response.output_tokens,
                    duration_ms,
                }
            }
            Err(e) => {
                warn!("{} call via {} failed: {}", stage, self.backend.name(), e);
                StageResult {
                    stage,
                    batch: None,
                    text: None,
                    error: Some(e),
                    images_sent,
                    input_tokens: 0,
                    output_tokens: 0,
                    duration_ms,
                }
            }
        }
    }
}

/// Build the request for `stage` without sending it.
pub fn build_request(
    stage: AnalysisStage,
    images: &[&ExtractedImage],
    table_text: &str,
    prior_context: &str,
    config: &ReportConfig,
) -> CompletionRequest {
    let profile = config.profile(stage);
    let mut parts = vec![ContentPart::Text(prompts::instruction(stage, config))];

    if !prior_context.trim().is_empty() {
        parts.push(ContentPart::Text(prompts::labelled_block(
            PRIOR_FINDINGS_LABEL,
            prior_context,
        )));
    }

    if !table_text.trim().is_empty() {
        parts.push(ContentPart::Text(prompts::labelled_block(
            TABLE_DATA_LABEL,
            &truncate_chars(table_text, profile.table_char_ceiling),
        )));
    }

    parts.extend(
        images
            .iter()
            .take(profile.max_images)
            .map(|img| ContentPart::Image {
                data: img.data.clone(),
                mime_type: img.mime_type.clone(),
            }),
    );

    CompletionRequest {
        model: config.model_id().to_string(),
        messages: vec![Message::user(parts)],
        temperature: config.temperature,
        max_tokens: profile.max_tokens,
    }
}
