//! Image normalisation: arbitrary raster bytes → bounded base64 JPEG.
//!
//! Slide decks embed whatever the author pasted in: transparent PNG charts,
//! 6000 px camera photos, palette GIFs, CMYK JPEGs. Multimodal APIs accept a
//! limited request size and some reject alpha outright, so every image is
//! brought to one shape before it goes anywhere near a request body:
//!
//! 1. alpha composited onto opaque white, everything else converted to RGB8
//! 2. longest side capped at [`ImageLimits::max_dimension`] with Lanczos3
//! 3. JPEG at [`ImageLimits::jpeg_quality`], base64 encoded
//! 4. payloads above [`ImageLimits::ceiling_kb`] are rejected, not squeezed
//!
//! An RGB JPEG within the size bound keeps its original bytes when the
//! re-encode would not be smaller, so normalising twice never grows the payload.

use crate::config::ImageLimits;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat, Rgb, RgbImage};
use thiserror::Error;
use tracing::debug;

/// MIME type of every normalised image.
pub const JPEG_MIME: &str = "image/jpeg";

/// An image ready to be attached to a model request.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    /// Base64 (standard alphabet) JPEG bytes.
    pub data: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// `data.len() / 1024`.
    pub size_kb: f64,
}

/// Why an image could not be normalised.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("{size_kb:.0} KB exceeds the {ceiling_kb:.0} KB limit")]
    Oversized { size_kb: f64, ceiling_kb: f64 },
}

/// Normalise raw image bytes for a model request.
///
/// Returns [`NormalizeError::Oversized`] instead of recompressing harder when
/// the encoded payload is above the ceiling; the caller drops the image.
pub fn normalize_image(
    bytes: &[u8],
    limits: &ImageLimits,
) -> Result<NormalizedImage, NormalizeError> {
    let format = image::guess_format(bytes).map_err(|e| NormalizeError::Decode(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| NormalizeError::Decode(e.to_string()))?;

    let (width, height) = (img.width(), img.height());
    let reusable = format == ImageFormat::Jpeg
        && img.color() == ColorType::Rgb8
        && width <= limits.max_dimension
        && height <= limits.max_dimension;

    let rgb = downscale(flatten_to_rgb(img), limits.max_dimension);
    let (width, height) = rgb.dimensions();
    let mut jpeg = encode_jpeg(&rgb, limits.jpeg_quality)?;
    if reusable && bytes.len() <= jpeg.len() {
        debug!("Keeping original {}x{} RGB JPEG, re-encode is not smaller", width, height);
        jpeg = bytes.to_vec();
    }

    let data = STANDARD.encode(&jpeg);
    let size_kb = data.len() as f64 / 1024.0;
    debug!(
        "Normalised image → {}x{} px, {:.1} KB base64",
        width, height, size_kb
    );

    if size_kb > limits.ceiling_kb {
        return Err(NormalizeError::Oversized {
            size_kb,
            ceiling_kb: limits.ceiling_kb,
        });
    }

    Ok(NormalizedImage {
        data,
        mime_type: JPEG_MIME.to_string(),
        width,
        height,
        size_kb,
    })
}

/// Composite alpha onto white, or plainly convert, to opaque RGB8.
fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }

    let rgba = img.into_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let a = a as u16;
        // c·a + 255·(1 − a), rounded
        let over_white = |c: u8| ((c as u16 * a + 255 * (255 - a) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([over_white(r), over_white(g), over_white(b)]));
    }
    out
}

/// Shrink so neither side exceeds `max_dim`, keeping the aspect ratio. Never enlarges.
fn downscale(rgb: RgbImage, max_dim: u32) -> RgbImage {
    let (w, h) = rgb.dimensions();
    if w <= max_dim && h <= max_dim {
        return rgb;
    }

    let scale = max_dim as f64 / w.max(h) as f64;
    let nw = ((w as f64 * scale).round() as u32).clamp(1, max_dim);
    let nh = ((h as f64 * scale).round() as u32).clamp(1, max_dim);
    debug!("Downscaling {}x{} → {}x{}", w, h, nw, nh);
    image::imageops::resize(&rgb, nw, nh, FilterType::Lanczos3)
}

fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, NormalizeError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| NormalizeError::Encode(e.to_string()))?;
    Ok(buf)
}
