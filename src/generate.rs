//! Report generation: the pipeline object and its convenience entry points.
//!
//! [`ReportPipeline`] exposes the three stages separately so each can be
//! driven and tested on its own:
//!
//! ```text
//! extract ──▶ analyze_batches ──▶ assemble_report
//!  (slides)    (Initial ×N)        (Comprehensive, else Summary)
//! ```
//!
//! Everything runs strictly in sequence: one model call at a time, in batch
//! order. The async API only suspends on I/O. A pipeline holds immutable
//! configuration and a shared backend, so concurrent runs need nothing more
//! than their own `run` call.

use crate::backend::{resolve_backend, ModelBackend};
use crate::config::ReportConfig;
use crate::error::DeckReportError;
use crate::output::{
    combine_outputs, composite_markdown, AssembledReport, BatchAnalysis, Report, ReportOutput,
    ReportStats,
};
use crate::pipeline::batch::partition;
use crate::pipeline::extract::{extract_images, extract_presentation, ExtractedImage, Extraction};
use crate::pipeline::input::{self, InputDocument};
use crate::pipeline::llm::{AnalysisClient, StageResult};
use crate::pipeline::pptx::{DeckMetadata, PptxPackage};
use crate::pipeline::table::truncate_chars;
use crate::progress::{NoopProgressCallback, ReportProgressCallback};
use crate::stage::AnalysisStage;
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Extraction, batched analysis and report assembly over one backend.
pub struct ReportPipeline {
    config: ReportConfig,
    backend: Arc<dyn ModelBackend>,
}

impl ReportPipeline {
    /// Build a pipeline, resolving the model backend once.
    ///
    /// Fails with [`DeckReportError::ProviderNotConfigured`] when no backend
    /// or API key can be found.
    pub fn new(config: ReportConfig) -> Result<Self, DeckReportError> {
        let backend = resolve_backend(&config)?;
        Ok(Self { config, backend })
    }

    /// Build a pipeline around an explicit backend.
    pub fn with_backend(config: ReportConfig, backend: Arc<dyn ModelBackend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    fn callback(&self) -> &dyn ReportProgressCallback {
        match &self.config.progress_callback {
            Some(cb) => cb.as_ref(),
            None => &NoopProgressCallback,
        }
    }

    // ── Stage 1: extraction ──────────────────────────────────────────────

    /// Validate a `.pptx` and pull its images and tables.
    pub async fn extract(&self, doc: InputDocument) -> Result<Extraction, DeckReportError> {
        input::check_presentation(&doc, &self.config.input_limits)?;
        let limits = self.config.extraction.clone();
        let extraction = tokio::task::spawn_blocking(move || {
            extract_presentation(&doc.bytes, &doc.name, &limits)
        })
        .await
        .map_err(|e| DeckReportError::Internal(format!("extraction task: {e}")))??;
        self.report_extraction(&extraction);
        Ok(extraction)
    }

    /// Validate standalone images and normalise them.
    pub async fn extract_image_files(
        &self,
        files: Vec<InputDocument>,
    ) -> Result<Extraction, DeckReportError> {
        input::check_images(&files, &self.config.input_limits)?;
        let limits = self.config.extraction.clone();
        let extraction = tokio::task::spawn_blocking(move || {
            let named: Vec<(String, Vec<u8>)> =
                files.into_iter().map(|f| (f.name, f.bytes)).collect();
            extract_images(&named, &limits)
        })
        .await
        .map_err(|e| DeckReportError::Internal(format!("extraction task: {e}")))?;
        self.report_extraction(&extraction);
        Ok(extraction)
    }

    fn report_extraction(&self, extraction: &Extraction) {
        let cb = self.callback();
        for w in &extraction.warnings {
            cb.on_item_warning(w);
        }
        cb.on_extraction_complete(
            extraction.image_count,
            extraction.table_count(),
            extraction.warnings.len(),
        );
    }

    // ── Stage 2: Initial per batch ───────────────────────────────────────

    /// Run the Initial stage once per image batch, in order.
    ///
    /// Table text rides along with the first batch only. A deck with tables
    /// but no images gets one text-only call. Fails with
    /// [`DeckReportError::NoContent`] when there is nothing to send and with
    /// [`DeckReportError::ExtractionFailed`] when every call failed.
    pub async fn analyze_batches(
        &self,
        extraction: &Extraction,
    ) -> Result<BatchAnalysis, DeckReportError> {
        let images = extraction.images();
        let table_text = extraction.table_text();
        if images.is_empty() && table_text.is_empty() {
            return Err(DeckReportError::NoContent {
                source_name: extraction.source_name.clone(),
            });
        }

        let batches = partition(&images, self.config.batch_size)?;
        let jobs: Vec<&[&ExtractedImage]> = if batches.is_empty() {
            vec![&images[..0]]
        } else {
            batches.iter().map(|b| b.items).collect()
        };
        let total = jobs.len();
        info!(
            "Initial stage: {} image(s) in {} batch(es) of up to {}",
            images.len(),
            total,
            self.config.batch_size
        );

        let cb = self.callback();
        let client = AnalysisClient::new(self.backend.as_ref(), &self.config);
        let mut results = Vec::with_capacity(total);

        for (i, batch_images) in jobs.into_iter().enumerate() {
            let number = i + 1;
            let tables = if i == 0 { table_text.as_str() } else { "" };
            cb.on_batch_start(number, total);

            let mut result = client
                .analyze(AnalysisStage::Initial, batch_images, tables, "")
                .await;
            result.batch = Some(number);

            match &result.text {
                Some(text) => {
                    info!("Batch {}/{} done ({} chars)", number, total, text.len());
                    cb.on_batch_complete(number, total, text.len());
                }
                None => {
                    let msg = result.error_message();
                    warn!("Batch {}/{} produced no output: {}", number, total, msg);
                    cb.on_batch_error(number, total, &msg);
                }
            }
            results.push(result);
        }

        let combined = combine_outputs(&results);
        if combined.is_empty() {
            let first_error = results
                .iter()
                .find_map(|r| r.error.as_ref().map(|e| e.to_string()))
                .unwrap_or_else(|| "no output".to_string());
            return Err(DeckReportError::ExtractionFailed {
                batches: results.len(),
                first_error,
            });
        }

        Ok(BatchAnalysis { results, combined })
    }

    // ── Stage 3: Comprehensive, else Summary ─────────────────────────────

    /// Write the report from the combined Initial findings.
    ///
    /// Comprehensive runs once over the front `comprehensive_image_slice`
    /// images; when it yields nothing, Summary runs over the front
    /// `summary_image_slice` images. Each stage gets the combined findings
    /// cut at its own context ceiling.
    pub async fn assemble_report(
        &self,
        extraction: &Extraction,
        analysis: &BatchAnalysis,
    ) -> Result<AssembledReport, DeckReportError> {
        let images = extraction.images();
        let client = AnalysisClient::new(self.backend.as_ref(), &self.config);
        let mut results = Vec::with_capacity(2);

        let comprehensive = self
            .final_stage(
                &client,
                AnalysisStage::Comprehensive,
                &images,
                self.config.comprehensive_image_slice,
                &analysis.combined,
            )
            .await;
        let comprehensive_error = comprehensive.error_message();
        let comprehensive_text = comprehensive.text.clone();
        results.push(comprehensive);

        if let Some(text) = comprehensive_text {
            return Ok(self.finish_report(text, AnalysisStage::Comprehensive, results));
        }

        info!("Comprehensive stage produced nothing, falling back to Summary");
        let summary = self
            .final_stage(
                &client,
                AnalysisStage::Summary,
                &images,
                self.config.summary_image_slice,
                &analysis.combined,
            )
            .await;
        let summary_error = summary.error_message();
        let summary_text = summary.text.clone();
        results.push(summary);

        match summary_text {
            Some(text) => Ok(self.finish_report(text, AnalysisStage::Summary, results)),
            None => Err(DeckReportError::ReportFailed {
                comprehensive: comprehensive_error,
                summary: summary_error,
            }),
        }
    }

    async fn final_stage(
        &self,
        client: &AnalysisClient<'_>,
        stage: AnalysisStage,
        images: &[&ExtractedImage],
        slice: usize,
        combined: &str,
    ) -> StageResult {
        let cb = self.callback();
        let front = &images[..images.len().min(slice)];
        let context = truncate_chars(combined, self.config.profile(stage).context_char_ceiling);

        cb.on_stage_start(stage);
        let result = client.analyze(stage, front, "", &context).await;
        match &result.text {
            Some(text) => cb.on_stage_complete(stage, text.len()),
            None => cb.on_stage_error(stage, &result.error_message()),
        }
        result
    }

    fn finish_report(
        &self,
        text: String,
        stage: AnalysisStage,
        results: Vec<StageResult>,
    ) -> AssembledReport {
        info!("Report written by {} stage ({} chars)", stage, text.len());
        self.callback().on_report_complete(stage, text.len());
        AssembledReport {
            report: Report { text, stage },
            results,
        }
    }

    // ── End to end ───────────────────────────────────────────────────────

    /// Extract, analyse and assemble a report for one `.pptx`.
    pub async fn run(&self, doc: InputDocument) -> Result<ReportOutput, DeckReportError> {
        let start = Instant::now();
        let extraction = self.extract(doc).await?;
        let extraction_ms = start.elapsed().as_millis() as u64;
        self.analyze_and_assemble(extraction, extraction_ms, start).await
    }

    /// Extract, analyse and assemble a report for a set of images.
    pub async fn run_images(
        &self,
        files: Vec<InputDocument>,
    ) -> Result<ReportOutput, DeckReportError> {
        let start = Instant::now();
        let extraction = self.extract_image_files(files).await?;
        let extraction_ms = start.elapsed().as_millis() as u64;
        self.analyze_and_assemble(extraction, extraction_ms, start).await
    }

    async fn analyze_and_assemble(
        &self,
        extraction: Extraction,
        extraction_ms: u64,
        start: Instant,
    ) -> Result<ReportOutput, DeckReportError> {
        let analysis = self.analyze_batches(&extraction).await?;
        let assembled = self.assemble_report(&extraction, &analysis).await?;

        let mut stats = ReportStats::tally(&extraction, &analysis, &assembled.results);
        stats.extraction_ms = extraction_ms;
        stats.total_ms = start.elapsed().as_millis() as u64;
        info!(
            "Done: {} call(s), {} input / {} output tokens, {}ms",
            stats.model_calls, stats.total_input_tokens, stats.total_output_tokens, stats.total_ms
        );

        Ok(ReportOutput {
            source_name: extraction.source_name,
            composite_markdown: composite_markdown(&analysis.combined, &assembled.report.text),
            report: assembled.report,
            combined_extraction: analysis.combined,
            initial_results: analysis.results,
            final_results: assembled.results,
            warnings: extraction.warnings,
            stats,
        })
    }
}

// ── Convenience entry points ─────────────────────────────────────────────

/// Generate a report for a `.pptx` file path or URL.
///
/// # Errors
/// Returns `Err(DeckReportError)` only for fatal errors: unreadable input,
/// no credential, nothing extracted, every Initial batch failed, or both
/// report stages failed. Dropped items and failed batches are in
/// `output.warnings` and `output.initial_results`.
pub async fn generate_report(
    input: impl AsRef<str>,
    config: &ReportConfig,
) -> Result<ReportOutput, DeckReportError> {
    let input = input.as_ref();
    info!("Generating report for {}", input);
    let pipeline = ReportPipeline::new(config.clone())?;
    let doc = input::resolve_input(
        input,
        config.download_timeout_secs,
        config.input_limits.max_presentation_mb,
    )
    .await?;
    pipeline.run(doc).await
}

/// Generate a report for `.pptx` bytes already in memory.
///
/// # Example
/// ```rust,no_run
/// use deck_report::{generate_report_from_bytes, ReportConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("ohi-results.pptx")?;
/// let config = ReportConfig::default();
/// let output = generate_report_from_bytes("ohi-results.pptx", bytes, &config).await?;
/// println!("{}", output.report.text);
/// # Ok(())
/// # }
/// ```
pub async fn generate_report_from_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    config: &ReportConfig,
) -> Result<ReportOutput, DeckReportError> {
    let pipeline = ReportPipeline::new(config.clone())?;
    pipeline.run(InputDocument::new(name, bytes)).await
}

/// Generate a report for standalone image files (paths or URLs).
pub async fn generate_report_from_images(
    inputs: &[String],
    config: &ReportConfig,
) -> Result<ReportOutput, DeckReportError> {
    info!("Generating report for {} image(s)", inputs.len());
    let pipeline = ReportPipeline::new(config.clone())?;
    if inputs.len() > config.input_limits.max_image_files {
        return Err(DeckReportError::TooManyImages {
            count: inputs.len(),
            limit: config.input_limits.max_image_files,
        });
    }
    let files = input::resolve_images(
        inputs,
        config.download_timeout_secs,
        config.input_limits.max_images_total_mb,
    )
    .await?;
    pipeline.run_images(files).await
}

/// Synchronous wrapper around [`generate_report`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_report_sync(
    input: impl AsRef<str>,
    config: &ReportConfig,
) -> Result<ReportOutput, DeckReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DeckReportError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(generate_report(input, config))
}

/// What [`inspect`] found.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub metadata: DeckMetadata,
    pub extraction: Extraction,
}

/// Extract a `.pptx` without calling a model.
///
/// Does not require a backend or API key.
pub async fn inspect(
    input: impl AsRef<str>,
    config: &ReportConfig,
) -> Result<Inspection, DeckReportError> {
    let doc = input::resolve_input(
        input.as_ref(),
        config.download_timeout_secs,
        config.input_limits.max_presentation_mb,
    )
    .await?;
    input::check_presentation(&doc, &config.input_limits)?;
    let limits = config.extraction.clone();

    let inspection = tokio::task::spawn_blocking(move || {
        let extraction = extract_presentation(&doc.bytes, &doc.name, &limits)?;
        let metadata = PptxPackage::open(Cursor::new(doc.bytes.as_slice()))
            .map(|mut pkg| pkg.metadata())
            .unwrap_or_default();
        Ok::<_, DeckReportError>(Inspection {
            metadata,
            extraction,
        })
    })
    .await
    .map_err(|e| DeckReportError::Internal(format!("inspection task: {e}")))??;
    Ok(inspection)
}
