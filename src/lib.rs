//! # deck-report
//!
//! Turn survey result decks (`.pptx`) and chart screenshots into a written
//! narrative report using a multimodal LLM.
//!
//! ## Why this crate?
//!
//! Result decks carry their numbers in chart images and slide tables, not in
//! text a parser can read. This crate pulls the pictures and tables out of
//! the presentation package, shows them to a vision model in small batches
//! to collect the scores, then asks the model to write one report from the
//! merged findings.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .pptx / images
//!  │
//!  ├─ 1. Input     resolve local file or download from URL, validate
//!  ├─ 2. Extract   images + tables per slide (CPU-bound, spawn_blocking)
//!  ├─ 3. Initial   one model call per batch of images, strictly in order
//!  ├─ 4. Report    Comprehensive over the merged findings, Summary fallback
//!  └─ 5. Export    {stem}.txt, {stem}.md, {stem}_complete.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deck_report::{generate_report, ReportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GROQ_API_KEY from the environment
//!     let config = ReportConfig::default();
//!     let output = generate_report("ohi-results.pptx", &config).await?;
//!     println!("{}", output.report.text);
//!     eprintln!("{} model calls, {} input tokens",
//!         output.stats.model_calls,
//!         output.stats.total_input_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `deck-report` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! deck-report = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! Any OpenAI-compatible chat endpoint works through
//! [`OpenAiCompatibleBackend`] (Groq by default). Providers known to
//! `edgequake-llm` are reachable by name through [`ProviderBackend`], and
//! [`MockBackend`] answers from a script for tests and dry runs.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{MockBackend, ModelBackend, OpenAiCompatibleBackend, ProviderBackend};
pub use config::{
    ExtractionLimits, ExtractionPolicy, ImageLimits, InputLimits, ReportConfig, ReportConfigBuilder,
};
pub use error::{DeckReportError, ItemError, ModelCallError};
pub use export::{write_exports, ExportPaths};
pub use generate::{
    generate_report, generate_report_from_bytes, generate_report_from_images,
    generate_report_sync, inspect, Inspection, ReportPipeline,
};
pub use output::{Report, ReportOutput, ReportStats};
pub use pipeline::extract::{Extraction, ExtractedItem};
pub use pipeline::input::InputDocument;
pub use pipeline::llm::StageResult;
pub use progress::{NoopProgressCallback, ProgressCallback, ReportProgressCallback};
pub use stage::{AnalysisStage, StageProfile};
