//! Error types for the deck-report library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`DeckReportError`] — **Fatal**: the run cannot proceed at all (bad
//!   input file, unreadable presentation, no credential, every extraction
//!   batch failed). Returned as `Err(DeckReportError)` from the top-level
//!   `generate_*` functions and from [`crate::ReportPipeline`] stages.
//!
//! * [`ItemError`] — **Non-fatal**: a single image or table could not be
//!   normalised. The item is dropped, the warning is stored in
//!   [`crate::pipeline::extract::Extraction::warnings`] and extraction
//!   continues with the remaining shapes.
//!
//! * [`ModelCallError`] — **Per call**: one request to the model failed. The
//!   stage that issued it is treated as having produced nothing; the
//!   assembler decides whether that is fatal (every Initial batch failed) or
//!   recoverable (Comprehensive falls back to Summary).

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the deck-report library.
#[derive(Debug, Error)]
pub enum DeckReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file was read but is not a zip-based `.pptx` package.
    #[error("File is not a PowerPoint (.pptx) presentation: '{source_name}'\nFirst bytes: {magic:?}")]
    NotAPresentation { source_name: String, magic: [u8; 4] },

    /// The file is a legacy binary `.ppt` (OLE compound document).
    #[error("'{source_name}' is a legacy .ppt file\nSave it as .pptx in PowerPoint or LibreOffice and try again.")]
    UnsupportedLegacyPresentation { source_name: String },

    /// A standalone image input is not in a supported raster format.
    #[error("File is not a supported image (PNG/JPEG/GIF/BMP/TIFF/WebP): '{source_name}'")]
    NotAnImage { source_name: String },

    /// Input exceeds the configured size limit.
    #[error("'{source_name}' is too large ({size_mb:.1} MB). Maximum is {limit_mb} MB.")]
    InputTooLarge {
        source_name: String,
        size_mb: f64,
        limit_mb: u64,
    },

    /// More standalone images than the configured limit.
    #[error("Too many images: {count} given, maximum is {limit}")]
    TooManyImages { count: usize, limit: usize },

    // ── Document errors ───────────────────────────────────────────────────
    /// The presentation package or one of its slide parts cannot be parsed.
    #[error("Presentation '{source_name}' cannot be read: {detail}")]
    CorruptPresentation { source_name: String, detail: String },

    /// Extraction finished without a single image or table.
    #[error("No images or tables could be extracted from '{source_name}'")]
    NoContent { source_name: String },

    // ── Analysis errors ───────────────────────────────────────────────────
    /// The configured model backend cannot be constructed (missing API key etc.).
    #[error("Model provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every Initial batch failed; the Comprehensive stage is never attempted.
    #[error("Data extraction failed: all {batches} batch(es) returned no output.\nFirst error: {first_error}")]
    ExtractionFailed { batches: usize, first_error: String },

    /// Both the Comprehensive stage and its Summary fallback failed.
    #[error("Report generation failed.\nComprehensive: {comprehensive}\nSummary: {summary}")]
    ReportFailed {
        comprehensive: String,
        summary: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an export file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single extracted item.
///
/// The offending image or table is left out of the extraction; every other
/// item on the slide is still processed.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The image bytes could not be decoded or re-encoded.
    #[error("Slide {slide}: image could not be processed: {detail}")]
    ImageFailed { slide: usize, detail: String },

    /// The normalised image is still above the payload ceiling.
    #[error("Slide {slide}: image dropped, {size_kb:.0} KB exceeds the {ceiling_kb:.0} KB limit")]
    ImageOversized {
        slide: usize,
        size_kb: f64,
        ceiling_kb: f64,
    },

    /// The picture references a media part missing from the package.
    #[error("Slide {slide}: image part '{target}' is missing from the package")]
    ImageMissing { slide: usize, target: String },

    /// The table markup could not be read.
    #[error("Slide {slide}: table could not be read: {detail}")]
    TableFailed { slide: usize, detail: String },
}

impl ItemError {
    /// 1-indexed slide (or image file position) the item came from.
    pub fn slide(&self) -> usize {
        match self {
            ItemError::ImageFailed { slide, .. }
            | ItemError::ImageOversized { slide, .. }
            | ItemError::ImageMissing { slide, .. }
            | ItemError::TableFailed { slide, .. } => *slide,
        }
    }
}

/// Failure of a single model call.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ModelCallError {
    /// The request never got a response (DNS, TLS, connection reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport gave up waiting.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// HTTP 401/403.
    #[error("authentication rejected (HTTP {status}): {detail}")]
    Auth { status: u16, detail: String },

    /// HTTP 429.
    #[error("rate limit exceeded{}", .retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// HTTP 413: the images and text did not fit the provider's request limit.
    #[error("request payload too large: {detail}")]
    PayloadTooLarge { detail: String },

    /// Any other non-success HTTP status.
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// The response body was not the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The model answered with no text.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// Error reported by an `edgequake-llm` provider.
    #[error("provider error: {0}")]
    Provider(String),
}
