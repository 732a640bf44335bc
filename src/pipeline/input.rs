//! Input resolution: a user-supplied path or URL → validated bytes in memory.
//!
//! The OOXML reader works on a byte buffer, so downloads never touch the
//! file system. Inputs are checked up front so callers get a meaningful
//! error rather than a zip or XML parse failure:
//!
//! * `.pptx` must start with the zip signature `PK\x03\x04`
//! * a legacy `.ppt` (OLE compound file) is recognised and rejected by name
//! * standalone images must be in a format `image` can decode
//! * sizes and counts are bounded by [`InputLimits`]

use crate::config::InputLimits;
use crate::error::DeckReportError;
use std::path::Path;
use tracing::{debug, info};

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";
const CFB_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Bytes of one input plus the name used in messages and output files.
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / BYTES_PER_MB
    }

    /// File name without extension, for naming exports.
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("report")
            .to_string()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local path or download a URL.
///
/// Downloads stop with [`DeckReportError::InputTooLarge`] as soon as more
/// than `limit_mb` has arrived.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
    limit_mb: u64,
) -> Result<InputDocument, DeckReportError> {
    if is_url(input) {
        download_url(input, timeout_secs, limit_mb).await
    } else if input.trim().is_empty() {
        Err(DeckReportError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        read_local(Path::new(input)).await
    }
}

/// Reject anything that is not a `.pptx` within the size limit.
pub fn check_presentation(doc: &InputDocument, limits: &InputLimits) -> Result<(), DeckReportError> {
    let size_mb = doc.size_mb();
    if size_mb > limits.max_presentation_mb as f64 {
        return Err(DeckReportError::InputTooLarge {
            source_name: doc.name.clone(),
            size_mb,
            limit_mb: limits.max_presentation_mb,
        });
    }

    let mut magic = [0u8; 4];
    let n = doc.bytes.len().min(4);
    magic[..n].copy_from_slice(&doc.bytes[..n]);
    if magic == CFB_MAGIC {
        return Err(DeckReportError::UnsupportedLegacyPresentation {
            source_name: doc.name.clone(),
        });
    }
    if magic != ZIP_MAGIC {
        return Err(DeckReportError::NotAPresentation {
            source_name: doc.name.clone(),
            magic,
        });
    }
    Ok(())
}

/// Reject an image set that is too large, too numerous, or has no image at all.
///
/// Individual unreadable files are left to extraction, which drops them with
/// a warning.
pub fn check_images(files: &[InputDocument], limits: &InputLimits) -> Result<(), DeckReportError> {
    if files.is_empty() {
        return Err(DeckReportError::InvalidInput {
            input: "no image files given".into(),
        });
    }
    if files.len() > limits.max_image_files {
        return Err(DeckReportError::TooManyImages {
            count: files.len(),
            limit: limits.max_image_files,
        });
    }
    let total_mb: f64 = files.iter().map(InputDocument::size_mb).sum();
    if total_mb > limits.max_images_total_mb as f64 {
        return Err(DeckReportError::InputTooLarge {
            source_name: format!("{} images", files.len()),
            size_mb: total_mb,
            limit_mb: limits.max_images_total_mb,
        });
    }
    if files.iter().all(|f| image::guess_format(&f.bytes).is_err()) {
        return Err(DeckReportError::NotAnImage {
            source_name: files[0].name.clone(),
        });
    }
    Ok(())
}

/// Read standalone image files (local paths or URLs), in order.
pub async fn resolve_images(
    inputs: &[String],
    timeout_secs: u64,
    limit_mb: u64,
) -> Result<Vec<InputDocument>, DeckReportError> {
    let mut files = Vec::with_capacity(inputs.len());
    for input in inputs {
        files.push(resolve_input(input, timeout_secs, limit_mb).await?);
    }
    Ok(files)
}

async fn read_local(path: &Path) -> Result<InputDocument, DeckReportError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DeckReportError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => DeckReportError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => DeckReportError::InvalidInput {
            input: format!("{}: {e}", path.display()),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    debug!("Read {} ({} bytes)", path.display(), bytes.len());
    Ok(InputDocument::new(name, bytes))
}

/// Download a URL into memory, at most `limit_mb`.
async fn download_url(
    url: &str,
    timeout_secs: u64,
    limit_mb: u64,
) -> Result<InputDocument, DeckReportError> {
    info!("Downloading: {}", url);

    let failed = |reason: String| DeckReportError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let transport = |e: reqwest::Error| {
        if e.is_timeout() {
            DeckReportError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let name = filename_from_url(url);
    let limit_bytes = limit_mb.saturating_mul(1024 * 1024);
    let too_large = |len: u64| DeckReportError::InputTooLarge {
        source_name: name.clone(),
        size_mb: len as f64 / BYTES_PER_MB,
        limit_mb,
    };

    let mut response = client.get(url).send().await.map_err(transport)?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    if let Some(len) = response.content_length().filter(|&len| len > limit_bytes) {
        return Err(too_large(len));
    }

    let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    while let Some(chunk) = response.chunk().await.map_err(transport)? {
        bytes.extend_from_slice(&chunk);
        if bytes.len() as u64 > limit_bytes {
            return Err(too_large(bytes.len() as u64));
        }
    }
    info!("Downloaded {} bytes", bytes.len());
    Ok(InputDocument::new(name, bytes))
}

/// Last path segment of the URL, if it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pptx".to_string())
}
