//! Image preprocessing ahead of OCR.
//!
//! Phone photos of prescriptions are often dim, low-contrast and slightly
//! soft. Three steps improve OCR yield on small printed text:
//! recompress at high JPEG quality, stretch contrast to the full range,
//! then apply an unsharp mask.
//!
//! Preprocessing is never fatal. `prepare_for_ocr` falls back to the
//! original bytes and reports an `ExtractionWarning` instead of failing.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageOutputFormat, RgbImage};
use tracing::debug;

use super::types::ExtractionWarning;
use super::ExtractionError;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Maximum input image size (in bytes) before rejecting.
/// Prevents OOM on corrupt/adversarial files.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
const MIN_IMAGE_BYTES: usize = 67;

/// Decoded pixel budget. A 48 MP phone photo fits; header-only bombs do not.
const DEFAULT_MAX_PIXELS: u64 = 64 * 1024 * 1024;

// ═══════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════

/// Tuning for the OCR preprocessing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    /// JPEG recompression quality (1-100).
    pub jpeg_quality: u8,
    /// Gaussian sigma of the unsharp mask. ~2.0 suits small printed text.
    pub sharpen_sigma: f32,
    /// Minimum brightness difference the unsharp mask acts on.
    pub sharpen_threshold: i32,
    /// Fraction of darkest and brightest pixels ignored when stretching contrast.
    pub contrast_clip: f32,
    /// Largest `width * height` decoded. Checked against the header first.
    pub max_pixels: u64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 95,
            sharpen_sigma: 2.0,
            sharpen_threshold: 1,
            contrast_clip: 0.01,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Service trait
// ═══════════════════════════════════════════════════════════

/// Turns raw upload bytes into bytes better suited for OCR.
pub trait ImagePreprocessor: Send + Sync {
    fn preprocess(&self, image_bytes: &[u8]) -> Result<Vec<u8>, ExtractionError>;
}

/// Result of `prepare_for_ocr`: the bytes to send plus any warning raised.
#[derive(Debug)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub warning: Option<ExtractionWarning>,
}

/// Run the preprocessor, falling back to the untouched input on any failure.
pub fn prepare_for_ocr(preprocessor: &dyn ImagePreprocessor, image_bytes: &[u8]) -> PreparedImage {
    match preprocessor.preprocess(image_bytes) {
        Ok(bytes) => PreparedImage {
            bytes,
            warning: None,
        },
        Err(e) => PreparedImage {
            bytes: image_bytes.to_vec(),
            warning: Some(ExtractionWarning::PreprocessingFailed {
                reason: e.to_string(),
            }),
        },
    }
}

// ═══════════════════════════════════════════════════════════
// Production implementation
// ═══════════════════════════════════════════════════════════

/// Recompress → contrast stretch → unsharp mask, output as JPEG.
#[derive(Debug, Clone, Default)]
pub struct OcrImagePreprocessor {
    config: PreprocessConfig,
}

impl OcrImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }
}

impl ImagePreprocessor for OcrImagePreprocessor {
    fn preprocess(&self, image_bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
        validate_image_bytes(image_bytes)?;
        check_pixel_budget(image_bytes, self.config.max_pixels)?;

        let img = image::load_from_memory(image_bytes).map_err(|e| {
            ExtractionError::ImageProcessing(format!("Failed to decode image: {e}"))
        })?;
        let (width, height) = img.dimensions();

        // Recompression happens on the final encode; all work is on RGB8.
        let mut rgb = img.to_rgb8();
        stretch_contrast(&mut rgb, self.config.contrast_clip);
        let sharpened = image::imageops::unsharpen(
            &rgb,
            self.config.sharpen_sigma,
            self.config.sharpen_threshold,
        );

        let jpeg_bytes = encode_jpeg(&sharpened, self.config.jpeg_quality)?;

        debug!(
            dimensions = %format!("{width}x{height}"),
            input_size = image_bytes.len(),
            output_size = jpeg_bytes.len(),
            "Image preprocessed for OCR"
        );

        Ok(jpeg_bytes)
    }
}

// ═══════════════════════════════════════════════════════════
// Image operations
// ═══════════════════════════════════════════════════════════

/// ITU-R BT.601 luminance of an RGB pixel.
fn luminance(p: &image::Rgb<u8>) -> u8 {
    let [r, g, b] = p.0;
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

/// Linear contrast stretch on luminance percentiles.
///
/// Finds the luminance values below which `clip` of pixels fall at each end
/// and maps that range onto 0-255, applied per channel. Flat images
/// (no spread between the percentiles) are left untouched.
pub fn stretch_contrast(img: &mut RgbImage, clip: f32) {
    let total = (img.width() as u64) * (img.height() as u64);
    if total == 0 {
        return;
    }

    let mut histogram = [0u64; 256];
    for p in img.pixels() {
        histogram[luminance(p) as usize] += 1;
    }

    let cutoff = ((total as f64) * clip.clamp(0.0, 0.49) as f64) as u64;
    let low = percentile_from_start(&histogram, cutoff);
    let high = percentile_from_end(&histogram, cutoff);
    if high <= low {
        return;
    }

    let range = (high - low) as f32;
    for p in img.pixels_mut() {
        for channel in p.0.iter_mut() {
            let stretched = (*channel as f32 - low as f32) * 255.0 / range;
            *channel = stretched.round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn percentile_from_start(histogram: &[u64; 256], cutoff: u64) -> u8 {
    let mut seen = 0u64;
    for (value, count) in histogram.iter().enumerate() {
        seen += count;
        if seen > cutoff {
            return value as u8;
        }
    }
    255
}

fn percentile_from_end(histogram: &[u64; 256], cutoff: u64) -> u8 {
    let mut seen = 0u64;
    for (value, count) in histogram.iter().enumerate().rev() {
        seen += count;
        if seen > cutoff {
            return value as u8;
        }
    }
    0
}

/// Validate image bytes before decoding.
/// Rejects clearly invalid input before decoding.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ExtractionError::ImageProcessing(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ExtractionError::ImageProcessing(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Read the dimensions from the image header and reject anything over
/// `max_pixels` before the decoder allocates the pixel buffer.
pub fn check_pixel_budget(bytes: &[u8], max_pixels: u64) -> Result<(), ExtractionError> {
    let (width, height) = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ExtractionError::ImageProcessing(format!("Failed to read image header: {e}")))?
        .into_dimensions()
        .map_err(|e| ExtractionError::ImageProcessing(format!("Failed to read image header: {e}")))?;

    let pixels = u64::from(width) * u64::from(height);
    if pixels > max_pixels {
        return Err(ExtractionError::ImageProcessing(format!(
            "Image dimensions {width}x{height} exceed the {max_pixels} pixel limit"
        )));
    }
    Ok(())
}

/// Encode RGB image as JPEG bytes.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, ExtractionError> {
    let dynamic = DynamicImage::ImageRgb8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Jpeg(quality.clamp(1, 100)))
        .map_err(|e| ExtractionError::ImageProcessing(format!("JPEG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

// ═══════════════════════════════════════════════════════════
// Test doubles
// ═══════════════════════════════════════════════════════════

/// Preprocessor that always fails. Exercises the original-bytes fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingPreprocessor;

impl ImagePreprocessor for FailingPreprocessor {
    fn preprocess(&self, _image_bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
        Err(ExtractionError::ImageProcessing("simulated failure".into()))
    }
}

/// Preprocessor that returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughPreprocessor;

impl ImagePreprocessor for PassthroughPreprocessor {
    fn preprocess(&self, image_bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
        Ok(image_bytes.to_vec())
    }
}
