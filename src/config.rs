//! Configuration types for deck-to-report generation.
//!
//! All pipeline behaviour is controlled through [`ReportConfig`], built via
//! its [`ReportConfigBuilder`]. The config is constructed once at start-up and
//! handed to [`crate::ReportPipeline::new`], which resolves the model backend
//! (and therefore the API key) exactly once. There is no global credential
//! cache.

use crate::backend::ModelBackend;
use crate::error::DeckReportError;
use crate::progress::ProgressCallback;
use crate::stage::{AnalysisStage, StageProfile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default OpenAI-compatible endpoint (Groq).
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default multimodal model served at [`DEFAULT_BASE_URL`].
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";

/// Environment variable consulted when no API key is set on the config.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Configuration for one report run.
///
/// Built via [`ReportConfig::builder()`] or using [`ReportConfig::default()`].
///
/// # Example
/// ```rust
/// use deck_report::{ExtractionPolicy, ReportConfig};
///
/// let config = ReportConfig::builder()
///     .batch_size(4)
///     .extraction_policy(ExtractionPolicy::PerSlide)
///     .temperature(0.7)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReportConfig {
    /// Caps and policy applied while walking slides. See [`ExtractionLimits`].
    pub extraction: ExtractionLimits,

    /// Images per Initial call. Default: 4.
    ///
    /// Every batch costs one model round trip; smaller batches give the model
    /// fewer images to read per answer at the cost of more calls.
    pub batch_size: usize,

    /// Budget for the per-batch Initial stage.
    pub initial: StageProfile,

    /// Budget for the single Comprehensive stage.
    pub comprehensive: StageProfile,

    /// Budget for the Summary fallback.
    pub summary: StageProfile,

    /// Images (front of the extracted list) sent with the Comprehensive call. Default: 3.
    pub comprehensive_image_slice: usize,

    /// Images (front of the extracted list) sent with the Summary call. Default: 2.
    ///
    /// Smaller than the Comprehensive slice so a fallback after a payload
    /// rejection has a better chance of fitting.
    pub summary_image_slice: usize,

    /// Model identifier sent with every request. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Sampling temperature. Default: 0.7.
    pub temperature: f32,

    /// API key for the OpenAI-compatible backend. If None, read from [`API_KEY_ENV`].
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible chat completions API.
    pub base_url: String,

    /// `edgequake-llm` provider name (e.g. "openai", "anthropic", "gemini").
    /// When set, the request goes through `ProviderFactory` instead of the
    /// OpenAI-compatible client.
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over everything else.
    pub backend: Option<Arc<dyn ModelBackend>>,

    /// Language the report is written in. Default: "English".
    pub report_language: String,

    /// Per-stage instruction overrides; stages without one use [`crate::prompts`].
    pub instruction_overrides: Vec<(AnalysisStage, String)>,

    /// Size limits applied to inputs before extraction.
    pub input_limits: InputLimits,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// HTTP timeout for a single model call in seconds. Default: 180.
    ///
    /// Enforced by the transport only; the pipeline itself never cancels.
    pub api_timeout_secs: u64,

    /// Receives extraction warnings and stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionLimits::default(),
            batch_size: 4,
            initial: StageProfile::default_for(AnalysisStage::Initial),
            comprehensive: StageProfile::default_for(AnalysisStage::Comprehensive),
            summary: StageProfile::default_for(AnalysisStage::Summary),
            comprehensive_image_slice: 3,
            summary_image_slice: 2,
            model: None,
            temperature: 0.7,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            provider_name: None,
            backend: None,
            report_language: "English".to_string(),
            instruction_overrides: Vec::new(),
            input_limits: InputLimits::default(),
            download_timeout_secs: 120,
            api_timeout_secs: 180,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfig")
            .field("extraction", &self.extraction)
            .field("batch_size", &self.batch_size)
            .field("initial", &self.initial)
            .field("comprehensive", &self.comprehensive)
            .field("summary", &self.summary)
            .field("comprehensive_image_slice", &self.comprehensive_image_slice)
            .field("summary_image_slice", &self.summary_image_slice)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn ModelBackend>"))
            .field("report_language", &self.report_language)
            .field("input_limits", &self.input_limits)
            .finish()
    }
}

impl ReportConfig {
    /// Create a new builder for `ReportConfig`.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder {
            config: Self::default(),
        }
    }

    /// The budget for `stage`.
    pub fn profile(&self, stage: AnalysisStage) -> &StageProfile {
        match stage {
            AnalysisStage::Initial => &self.initial,
            AnalysisStage::Comprehensive => &self.comprehensive,
            AnalysisStage::Summary => &self.summary,
        }
    }

    /// The model id requests are sent with.
    pub fn model_id(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// The caller-supplied instruction for `stage`, if any.
    pub fn instruction_override(&self, stage: AnalysisStage) -> Option<&str> {
        self.instruction_overrides
            .iter()
            .rev()
            .find(|(s, _)| *s == stage)
            .map(|(_, text)| text.as_str())
    }
}

/// Builder for [`ReportConfig`].
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl fmt::Debug for ReportConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ReportConfigBuilder {
    pub fn extraction(mut self, limits: ExtractionLimits) -> Self {
        self.config.extraction = limits;
        self
    }

    pub fn extraction_policy(mut self, policy: ExtractionPolicy) -> Self {
        self.config.extraction.policy = policy;
        self
    }

    pub fn max_slides(mut self, n: usize) -> Self {
        self.config.extraction.max_slides = n.max(1);
        self
    }

    pub fn max_images(mut self, n: usize) -> Self {
        self.config.extraction.max_images = n.max(1);
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.extraction.image.max_dimension = px.clamp(64, 4096);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.extraction.image.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn image_ceiling_kb(mut self, kb: f64) -> Self {
        self.config.extraction.image.ceiling_kb = kb;
        self
    }

    pub fn table_char_ceiling(mut self, n: usize) -> Self {
        self.config.extraction.table_char_ceiling = n;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn stage_profile(mut self, stage: AnalysisStage, profile: StageProfile) -> Self {
        match stage {
            AnalysisStage::Initial => self.config.initial = profile,
            AnalysisStage::Comprehensive => self.config.comprehensive = profile,
            AnalysisStage::Summary => self.config.summary = profile,
        }
        self
    }

    pub fn comprehensive_image_slice(mut self, n: usize) -> Self {
        self.config.comprehensive_image_slice = n;
        self
    }

    pub fn summary_image_slice(mut self, n: usize) -> Self {
        self.config.summary_image_slice = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn report_language(mut self, language: impl Into<String>) -> Self {
        self.config.report_language = language.into();
        self
    }

    pub fn instruction(mut self, stage: AnalysisStage, text: impl Into<String>) -> Self {
        self.config.instruction_overrides.push((stage, text.into()));
        self
    }

    pub fn input_limits(mut self, limits: InputLimits) -> Self {
        self.config.input_limits = limits;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReportConfig, DeckReportError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(DeckReportError::InvalidConfig(
                "Batch size must be ≥ 1".into(),
            ));
        }
        if c.extraction.image.ceiling_kb <= 0.0 {
            return Err(DeckReportError::InvalidConfig(format!(
                "Image ceiling must be positive, got {} KB",
                c.extraction.image.ceiling_kb
            )));
        }
        for stage in AnalysisStage::all() {
            let p = c.profile(*stage);
            if p.max_tokens == 0 {
                return Err(DeckReportError::InvalidConfig(format!(
                    "{stage} stage: max_tokens must be ≥ 1"
                )));
            }
        }
        if c.report_language.trim().is_empty() {
            return Err(DeckReportError::InvalidConfig(
                "Report language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Extraction ───────────────────────────────────────────────────────────

/// How images are picked while walking the slides.
///
/// | Policy | Slides scanned | Images kept |
/// |--------|----------------|-------------|
/// | `PerSlide` | first `max_slides` | first image per slide that fits the ceiling |
/// | `GlobalCap` | all | every qualifying image until `max_images` |
///
/// `PerSlide` spreads coverage over more slides when the model's
/// image-per-call budget is the scarce resource, which is the usual case for
/// wide decks of one chart per slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPolicy {
    /// One image per slide, bounded slide count. (default)
    #[default]
    PerSlide,
    /// Every image in document order until the global image cap.
    GlobalCap,
}

/// Caps applied by the content extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionLimits {
    pub policy: ExtractionPolicy,
    /// Slides scanned under [`ExtractionPolicy::PerSlide`]. Default: 13.
    pub max_slides: usize,
    /// Images collected under [`ExtractionPolicy::GlobalCap`]. Default: 13.
    pub max_images: usize,
    /// Table text ceiling in characters. Default: 2000.
    pub table_char_ceiling: usize,
    /// Image normaliser settings.
    pub image: ImageLimits,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            policy: ExtractionPolicy::default(),
            max_slides: 13,
            max_images: 13,
            table_char_ceiling: 2000,
            image: ImageLimits::default(),
        }
    }
}

/// Image normaliser settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageLimits {
    /// Longest permitted side in pixels. Default: 1024.
    pub max_dimension: u32,
    /// JPEG quality 1–100. Default: 80.
    pub jpeg_quality: u8,
    /// Largest base64 payload kept, in KB. Default: 500.
    pub ceiling_kb: f64,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            jpeg_quality: 80,
            ceiling_kb: 500.0,
        }
    }
}

/// Limits applied to raw inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputLimits {
    /// Largest accepted `.pptx`, in MB. Default: 50.
    pub max_presentation_mb: u64,
    /// Most standalone images per run. Default: 10.
    pub max_image_files: usize,
    /// Largest accepted total size of standalone images, in MB. Default: 25.
    pub max_images_total_mb: u64,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_presentation_mb: 50,
            max_image_files: 10,
            max_images_total_mb: 25,
        }
    }
}
