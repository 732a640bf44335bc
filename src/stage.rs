//! Analysis stages and their per-stage budgets.
//!
//! A report is produced by up to three kinds of model call:
//!
//! ```text
//! Initial ×N (one per image batch) ──▶ Comprehensive ──(no output)──▶ Summary
//! ```
//!
//! The stage decides which instruction template is sent, how many images
//! may ride along, how many tokens the model may write, and how much prior
//! text is forwarded. Stage order is driven by
//! [`crate::ReportPipeline`]; nothing here is persisted between runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One kind of model call in the report protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    /// Per-batch data extraction: scores, rankings, averages.
    Initial,
    /// Single full report over the merged Initial findings.
    Comprehensive,
    /// Shorter report, only run when Comprehensive produced nothing.
    Summary,
}

impl AnalysisStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Comprehensive => "comprehensive",
            Self::Summary => "summary",
        }
    }

    pub fn all() -> &'static [AnalysisStage] {
        &[Self::Initial, Self::Comprehensive, Self::Summary]
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request budget for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProfile {
    /// Images attached from the front of the provided slice; the rest are ignored.
    pub max_images: usize,
    /// Maximum output tokens the model may generate.
    pub max_tokens: usize,
    /// Character ceiling for the table block before `...` is appended.
    pub table_char_ceiling: usize,
    /// Character ceiling for prior findings forwarded into this stage.
    pub context_char_ceiling: usize,
}

impl StageProfile {
    /// Defaults for `stage`.
    pub fn default_for(stage: AnalysisStage) -> Self {
        match stage {
            AnalysisStage::Initial => Self {
                max_images: 4,
                max_tokens: 2048,
                table_char_ceiling: 3000,
                context_char_ceiling: 0,
            },
            AnalysisStage::Comprehensive => Self {
                max_images: 5,
                max_tokens: 4096,
                table_char_ceiling: 3000,
                context_char_ceiling: 6000,
            },
            AnalysisStage::Summary => Self {
                max_images: 3,
                max_tokens: 2048,
                table_char_ceiling: 2500,
                context_char_ceiling: 3000,
            },
        }
    }
}
