//! Result types of a report run.

use crate::error::ItemError;
use crate::pipeline::extract::Extraction;
use crate::pipeline::llm::StageResult;
use crate::stage::AnalysisStage;
use serde::Serialize;

/// Heading of the extraction half of the composite document.
pub const EXTRACTION_HEADING: &str = "# EXTRACTED DATA";
/// Heading of the report half of the composite document.
pub const REPORT_HEADING: &str = "# REPORT";

/// The final report text and the stage that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub text: String,
    /// [`AnalysisStage::Comprehensive`], or [`AnalysisStage::Summary`] after a fallback.
    pub stage: AnalysisStage,
}

impl Report {
    pub fn is_fallback(&self) -> bool {
        self.stage == AnalysisStage::Summary
    }
}

/// Outcome of the Initial stage over every batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchAnalysis {
    /// One result per Initial call, in batch order.
    pub results: Vec<StageResult>,
    /// Non-empty Initial outputs joined by a blank line.
    pub combined: String,
}

impl BatchAnalysis {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// The report plus the Comprehensive (and Summary, if it ran) results.
#[derive(Debug, Clone, Serialize)]
pub struct AssembledReport {
    pub report: Report,
    pub results: Vec<StageResult>,
}

/// Join the successful outputs of `results` with a blank line, in order.
pub fn combine_outputs(results: &[StageResult]) -> String {
    results
        .iter()
        .filter_map(|r| r.text.as_deref())
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The two-part Markdown export: extracted data, then the report.
pub fn composite_markdown(combined: &str, report: &str) -> String {
    format!("{EXTRACTION_HEADING}\n\n{combined}\n\n---\n\n{REPORT_HEADING}\n\n{report}")
}

/// Counts, tokens and timings of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportStats {
    pub slide_count: usize,
    pub slides_scanned: usize,
    pub images_extracted: usize,
    pub tables_extracted: usize,
    pub items_dropped: usize,
    pub batches: usize,
    pub batches_failed: usize,
    pub model_calls: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub extraction_ms: u64,
    pub analysis_ms: u64,
    pub total_ms: u64,
}

impl ReportStats {
    /// Fill counts from the extraction and every model call made.
    pub fn tally(extraction: &Extraction, initial: &BatchAnalysis, final_results: &[StageResult]) -> Self {
        let calls = initial.results.iter().chain(final_results.iter());
        let (input, output, ms) = calls.clone().fold((0u64, 0u64, 0u64), |acc, r| {
            (acc.0 + r.input_tokens, acc.1 + r.output_tokens, acc.2 + r.duration_ms)
        });
        Self {
            slide_count: extraction.slide_count,
            slides_scanned: extraction.slides_scanned,
            images_extracted: extraction.image_count,
            tables_extracted: extraction.table_count(),
            items_dropped: extraction.warnings.len(),
            batches: initial.results.len(),
            batches_failed: initial.failed(),
            model_calls: calls.count(),
            total_input_tokens: input,
            total_output_tokens: output,
            analysis_ms: ms,
            ..Self::default()
        }
    }
}

/// Everything a caller needs to display or export a run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportOutput {
    pub source_name: String,
    pub report: Report,
    /// Initial outputs joined, untruncated.
    pub combined_extraction: String,
    /// [`composite_markdown`] of the combined extraction and the report.
    pub composite_markdown: String,
    pub initial_results: Vec<StageResult>,
    /// Comprehensive, then Summary when it ran.
    pub final_results: Vec<StageResult>,
    pub warnings: Vec<ItemError>,
    pub stats: ReportStats,
}
