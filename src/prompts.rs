//! Instruction templates for the three analysis stages.
//!
//! Centralising every prompt here keeps the wording in one place and lets
//! unit tests inspect prompts directly without a model.
//!
//! The templates are written for Organizational Health Index (OHI) survey
//! decks: charts and tables of scores across the nine OHI outcomes. Callers
//! with a different kind of deck override them per stage via
//! [`crate::config::ReportConfigBuilder::instruction`].
//!
//! Each template carries a `{language}` placeholder that is replaced with
//! [`crate::config::ReportConfig::report_language`].

use crate::config::ReportConfig;
use crate::stage::AnalysisStage;

/// Label of the table block in a request.
pub const TABLE_DATA_LABEL: &str = "=== TABLE DATA ===";

/// Label of the prior-findings block in a request.
pub const PRIOR_FINDINGS_LABEL: &str = "=== PRIOR FINDINGS ===";

/// Closes a labelled block.
pub const BLOCK_END: &str = "===";

/// Per-batch data extraction.
pub const INITIAL_PROMPT: &str = r#"Analyse the Organizational Health Index (OHI) data in the attached images and tables.

Extract:
1. Every numeric score, paired with the dimension or practice it belongs to
2. The TOP 5 highest scores
3. The BOTTOM 5 lowest scores
4. The average score

Group scores under the nine OHI outcomes where the material allows: Direction, Leadership, Culture & Climate, Accountability, Coordination & Control, Capabilities, Motivation, External Orientation, Innovation & Learning.
Report only what the material shows; do not invent scores that are not visible.
Write 400-500 words in {language}."#;

/// Full report over the merged Initial findings.
pub const COMPREHENSIVE_PROMPT: &str = r#"Write a comprehensive OHI report (800-1000 words) from the prior findings and the attached material.

**ORGANIZATIONAL STRENGTHS** (about 250 words)
For the highest-scoring dimensions: the score and why it is a strength, its positive impact, and how to sustain it.

**AREAS FOR IMPROVEMENT** (about 350 words)
For the lowest-scoring dimensions: root-cause analysis, specific recommendations, quick wins, and medium-term actions.

**LEADERSHIP RECOMMENDATIONS** (about 300 words)
6-8 practical recommendations covering leadership behaviours, communication strategy, and a timeline.

Write in {language}. Keep it professional and actionable."#;

/// Shorter report, used when the comprehensive stage produced nothing.
pub const SUMMARY_PROMPT: &str = r#"Write a concise OHI summary report (400-600 words) from the prior findings and the attached material.

Cover, under a heading each:
- **KEY STRENGTHS**: the highest-scoring dimensions and what sustains them
- **PRIORITY IMPROVEMENTS**: the lowest-scoring dimensions with one concrete action each
- **NEXT STEPS**: 3-5 leadership actions for the coming quarter

Write in {language}. Keep it professional and actionable."#;

/// Built-in template for `stage`, before language substitution.
pub fn template(stage: AnalysisStage) -> &'static str {
    match stage {
        AnalysisStage::Initial => INITIAL_PROMPT,
        AnalysisStage::Comprehensive => COMPREHENSIVE_PROMPT,
        AnalysisStage::Summary => SUMMARY_PROMPT,
    }
}

/// The instruction sent for `stage`: the caller's override if any,
/// otherwise the built-in template, with `{language}` filled in.
pub fn instruction(stage: AnalysisStage, config: &ReportConfig) -> String {
    config
        .instruction_override(stage)
        .unwrap_or_else(|| template(stage))
        .replace("{language}", &config.report_language)
}

/// A labelled block: `label`, the body, then [`BLOCK_END`].
pub fn labelled_block(label: &str, body: &str) -> String {
    format!("{label}\n{body}\n{BLOCK_END}")
}
