//! Progress-callback trait for extraction and analysis events.
//!
//! Inject an [`Arc<dyn ReportProgressCallback>`] via
//! [`crate::config::ReportConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through extraction, each Initial batch and
//! the final report stage.
//!
//! This is also the channel for user-visible warnings: a dropped image, an
//! unreadable table, or a failed model call is reported here (and logged via
//! `tracing`) exactly once, while the run carries on.
//!
//! # Example
//!
//! ```rust
//! use deck_report::{ReportConfig, ReportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     batches: AtomicUsize,
//! }
//!
//! impl ReportProgressCallback for CountingCallback {
//!     fn on_batch_complete(&self, batch: usize, total: usize, output_len: usize) {
//!         self.batches.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Batch {}/{} done ({} chars)", batch, total, output_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { batches: AtomicUsize::new(0) });
//!
//! let config = ReportConfig::builder()
//!     .progress_callback(counter as Arc<dyn ReportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ItemError;
use crate::stage::AnalysisStage;
use std::sync::Arc;

/// Called by the report pipeline as it works.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Calls arrive sequentially from one task.
pub trait ReportProgressCallback: Send + Sync {
    /// Called once extraction finished.
    ///
    /// # Arguments
    /// * `images`   — images kept
    /// * `tables`   — tables kept
    /// * `warnings` — items dropped
    fn on_extraction_complete(&self, images: usize, tables: usize, warnings: usize) {
        let _ = (images, tables, warnings);
    }

    /// Called for every image or table that had to be dropped.
    fn on_item_warning(&self, warning: &ItemError) {
        let _ = warning;
    }

    /// Called just before an Initial request is sent.
    ///
    /// # Arguments
    /// * `batch` — 1-indexed batch number
    /// * `total` — number of batches
    fn on_batch_start(&self, batch: usize, total: usize) {
        let _ = (batch, total);
    }

    /// Called when an Initial batch returned text.
    fn on_batch_complete(&self, batch: usize, total: usize, output_len: usize) {
        let _ = (batch, total, output_len);
    }

    /// Called when an Initial batch produced nothing.
    fn on_batch_error(&self, batch: usize, total: usize, error: &str) {
        let _ = (batch, total, error);
    }

    /// Called before the Comprehensive or Summary request.
    fn on_stage_start(&self, stage: AnalysisStage) {
        let _ = stage;
    }

    /// Called when the Comprehensive or Summary stage returned text.
    fn on_stage_complete(&self, stage: AnalysisStage, output_len: usize) {
        let _ = (stage, output_len);
    }

    /// Called when the Comprehensive or Summary stage produced nothing.
    fn on_stage_error(&self, stage: AnalysisStage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once with the stage whose text became the report.
    fn on_report_complete(&self, stage: AnalysisStage, report_len: usize) {
        let _ = (stage, report_len);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReportConfig`].
pub type ProgressCallback = Arc<dyn ReportProgressCallback>;
