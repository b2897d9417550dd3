//! Downscaling and JPEG re-encoding of photos before upload.

use std::io::{BufRead, Cursor, Seek};
use std::path::Path;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use serde::{Deserialize, Serialize};

use crate::error::{MedCheckError, Result};

/// Default bound for the longest edge of an uploaded image.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Default JPEG quality for uploaded images.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Controls how an image is shrunk and encoded for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareOptions {
    /// Longest edge allowed in the output, in pixels.
    pub max_dimension: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl PrepareOptions {
    /// Sets the longest-edge bound.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Sets the JPEG quality.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_dimension == 0 {
            return Err(MedCheckError::InvalidRequest(
                "max dimension must be at least 1 pixel".into(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(MedCheckError::InvalidRequest(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// A JPEG ready to be sent inline to the inference endpoint.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// JPEG bytes.
    pub data: Vec<u8>,
    /// Width after downscaling.
    pub width: u32,
    /// Height after downscaling.
    pub height: u32,
    /// Width of the decoded source.
    pub original_width: u32,
    /// Height of the decoded source.
    pub original_height: u32,
}

impl PreparedImage {
    /// MIME type of the encoded data.
    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    /// Size of the encoded data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the source had to be shrunk.
    pub fn was_resized(&self) -> bool {
        self.width != self.original_width || self.height != self.original_height
    }

    /// Standard base64 without line wrapping.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// Computes output dimensions so the longest edge fits `max_dimension`.
///
/// Images already within the bound keep their size. Each side is rounded
/// and never drops below one pixel.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let largest = width.max(height).max(1);
    if largest <= max_dimension {
        return (width, height);
    }
    let ratio = largest as f64 / max_dimension as f64;
    let scale = |side: u32| ((side as f64 / ratio).round() as u32).max(1);
    (scale(width), scale(height))
}

/// Decodes the image at `path` and prepares it for upload.
///
/// The format is sniffed from content, so camera output with a misleading
/// extension still decodes. The EXIF orientation is applied before resizing.
pub fn prepare_image(path: impl AsRef<Path>, options: &PrepareOptions) -> Result<PreparedImage> {
    let path = path.as_ref();
    options.validate()?;
    let img = decode_upright(ImageReader::open(path)?)?;
    tracing::debug!(path = %path.display(), "decoded image");
    encode(img, options)
}

/// Prepares an image already held in memory.
pub fn prepare_image_bytes(bytes: &[u8], options: &PrepareOptions) -> Result<PreparedImage> {
    options.validate()?;
    if bytes.is_empty() {
        return Err(MedCheckError::UnsupportedImage("image data is empty".into()));
    }
    let img = decode_upright(ImageReader::new(Cursor::new(bytes)))?;
    encode(img, options)
}

/// Decodes and rotates/flips according to the EXIF Orientation tag.
fn decode_upright<R: BufRead + Seek>(reader: ImageReader<R>) -> Result<DynamicImage> {
    let mut decoder = reader.with_guessed_format()?.into_decoder()?;
    let orientation = decoder.orientation().unwrap_or_else(|e| {
        tracing::debug!("ignoring unreadable EXIF orientation: {e}");
        Orientation::NoTransforms
    });
    let mut img = DynamicImage::from_decoder(decoder)?;
    if orientation != Orientation::NoTransforms {
        tracing::debug!(?orientation, "applying EXIF orientation");
        img.apply_orientation(orientation);
    }
    Ok(img)
}

fn encode(img: DynamicImage, options: &PrepareOptions) -> Result<PreparedImage> {
    let (original_width, original_height) = img.dimensions();
    let (width, height) = target_dimensions(original_width, original_height, options.max_dimension);

    let img = if (width, height) != (original_width, original_height) {
        img.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut data = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut data, options.jpeg_quality);
    rgb.write_with_encoder(encoder)?;

    tracing::debug!(
        original_width,
        original_height,
        width,
        height,
        bytes = data.len(),
        "prepared image for upload"
    );

    Ok(PreparedImage {
        data,
        width,
        height,
        original_width,
        original_height,
    })
}
