//! Image preprocessing for the remote extraction path.
//!
//! Normalizes an arbitrary input image into a byte-budget-constrained,
//! dimension-capped payload: decode, EXIF orientation fix, downscale so the
//! longer side fits the cap, then encode with a quality walk-down until the
//! payload fits the byte budget. If the quality floor is reached and the
//! budget is still exceeded, exactly one more 80% re-scale and floor-quality
//! encode is attempted; the result may still exceed the budget for
//! pathological content — guaranteeing the bound is a non-goal.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ExtractionError;

/// Maximum input size before rejecting. Prevents OOM on corrupt files.
const MAX_INPUT_BYTES: usize = 50 * 1024 * 1024;

/// Smallest plausible encoded image (a minimal PNG is ~67 bytes).
const MIN_INPUT_BYTES: usize = 67;

/// Shrink factor for the single post-floor re-scale pass.
const RESCALE_FACTOR: f32 = 0.8;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Encodings the remote service accepts as payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadMime {
    Jpeg,
    Png,
    Webp,
}

impl PayloadMime {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

/// Encoded, budget-constrained payload ready for the remote service.
///
/// `byte_size` always equals `bytes.len()`; it stays at most
/// `max_bytes` except after the one permitted best-effort re-scale pass.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime: PayloadMime,
    pub byte_size: usize,
}

/// Knobs for `preprocess_image`. Defaults match the product targets:
/// ~800 KB payloads, 2000 px long edge, JPEG quality 90 down to 60.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessOptions {
    pub max_bytes: usize,
    pub max_dimension: u32,
    pub target_mime: PayloadMime,
    pub initial_quality: u8,
    pub quality_floor: u8,
    pub quality_step: u8,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            max_bytes: 800 * 1024,
            max_dimension: 2000,
            target_mime: PayloadMime::Jpeg,
            initial_quality: 90,
            quality_floor: 60,
            quality_step: 10,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Preprocessing
// ═══════════════════════════════════════════════════════════

/// Normalize a raw image into an encoded payload for the remote service.
pub fn preprocess_image(
    raw: &[u8],
    opts: &PreprocessOptions,
) -> Result<ImagePayload, ExtractionError> {
    validate_image_bytes(raw)?;

    let decoded = image::load_from_memory(raw)
        .map_err(|e| ExtractionError::ImageProcessing(e.to_string()))?;
    let oriented = apply_orientation(decoded, read_exif_orientation(raw));

    let (width, height) = oriented.dimensions();
    let mut target_dim = opts.max_dimension;
    let mut working = if width.max(height) > opts.max_dimension {
        scale_to_longer_side(&oriented, opts.max_dimension)
    } else {
        target_dim = width.max(height);
        oriented
    };

    // Quality walk-down at fixed dimensions. Only JPEG has a quality knob;
    // lossless targets go straight to the re-scale pass when over budget.
    let mut quality = opts.initial_quality.max(opts.quality_floor);
    let mut encoded = encode(&working, opts.target_mime, quality)?;
    if opts.target_mime == PayloadMime::Jpeg {
        while encoded.len() > opts.max_bytes && quality > opts.quality_floor {
            quality = quality
                .saturating_sub(opts.quality_step.max(1))
                .max(opts.quality_floor);
            encoded = encode(&working, opts.target_mime, quality)?;
        }
    }

    // One permitted re-scale at floor quality. Best effort: the result may
    // still exceed the budget.
    if encoded.len() > opts.max_bytes {
        target_dim = ((target_dim as f32 * RESCALE_FACTOR) as u32).max(1);
        working = scale_to_longer_side(&working, target_dim);
        encoded = encode(&working, opts.target_mime, opts.quality_floor)?;
        debug!(
            target_dim,
            byte_size = encoded.len(),
            over_budget = encoded.len() > opts.max_bytes,
            "Applied post-floor re-scale pass"
        );
    }

    let byte_size = encoded.len();
    Ok(ImagePayload {
        bytes: encoded,
        mime: opts.target_mime,
        byte_size,
    })
}

/// Reject inputs that are implausibly small or large before decoding.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.len() < MIN_INPUT_BYTES {
        return Err(ExtractionError::ImageProcessing(format!(
            "Input too small to be an image ({} bytes)",
            bytes.len()
        )));
    }
    if bytes.len() > MAX_INPUT_BYTES {
        return Err(ExtractionError::ImageProcessing(format!(
            "Input exceeds {} MB limit",
            MAX_INPUT_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Uniformly scale so the longer side equals `target`, aspect preserved.
/// CatmullRom: good text quality without Lanczos ringing around glyph edges.
fn scale_to_longer_side(img: &DynamicImage, target: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let longer = w.max(h);
    if longer <= target {
        return img.clone();
    }
    let scale = target as f64 / longer as f64;
    let new_w = ((w as f64 * scale).round() as u32).max(1);
    let new_h = ((h as f64 * scale).round() as u32).max(1);
    img.resize_exact(new_w, new_h, FilterType::CatmullRom)
}

/// Encode to the target mime. Quality only applies to JPEG; PNG and WEBP
/// are lossless here, so their budget handling relies on the re-scale pass.
fn encode(
    img: &DynamicImage,
    mime: PayloadMime,
    quality: u8,
) -> Result<Vec<u8>, ExtractionError> {
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    let mut buf = Vec::new();

    match mime {
        PayloadMime::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
            encoder
                .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                .map_err(|e| ExtractionError::ImageProcessing(e.to_string()))?;
        }
        PayloadMime::Png => {
            let encoder = PngEncoder::new(Cursor::new(&mut buf));
            encoder
                .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                .map_err(|e| ExtractionError::ImageProcessing(e.to_string()))?;
        }
        PayloadMime::Webp => {
            let encoder = WebPEncoder::new_lossless(Cursor::new(&mut buf));
            encoder
                .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                .map_err(|e| ExtractionError::ImageProcessing(e.to_string()))?;
        }
    }

    Ok(buf)
}

// ═══════════════════════════════════════════════════════════
// EXIF orientation
// ═══════════════════════════════════════════════════════════

/// Read EXIF orientation (1-8) from raw bytes. 1 means "as stored";
/// phone photos commonly carry 3, 6, or 8.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = std::io::Cursor::new(bytes);
    match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(data) => data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1),
        Err(_) => 1,
    }
}

/// Apply an EXIF orientation to a decoded image.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
