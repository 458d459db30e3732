//! Proportional image downscaling with format preservation.
//!
//! The input is decoded, shrunk so that its larger side equals the
//! configured maximum (when it exceeds it) and re-encoded in the format it
//! arrived in. Formats we cannot encode fall back to JPEG.

use crate::error::{PipelineError, Result};
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};
use std::io::Cursor;
use tracing::debug;

/// Largest width or height, in pixels, of a resized image
pub const DEFAULT_MAX_DIMENSION: u32 = 300;

/// Format used when the source format is unknown or cannot be encoded
pub const FALLBACK_FORMAT: ImageFormat = ImageFormat::Jpeg;

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone)]
pub struct ResizedImage {
    pub data: Bytes,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// False when the input was already within bounds
    pub resized: bool,
}

impl ResizedImage {
    pub fn content_type(&self) -> String {
        content_type(self.format)
    }
}

/// Upper-case format tag, e.g. "JPEG" or "PNG".
pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Png => "PNG",
        ImageFormat::Gif => "GIF",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Tiff => "TIFF",
        ImageFormat::Ico => "ICO",
        _ => "UNKNOWN",
    }
}

/// `image/<format-lowercase>`
pub fn content_type(format: ImageFormat) -> String {
    format!("image/{}", format_name(format).to_lowercase())
}

/// Format the output is written in for a given detected input format.
pub fn output_format(detected: Option<ImageFormat>) -> ImageFormat {
    match detected {
        Some(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif)) => format,
        _ => FALLBACK_FORMAT,
    }
}

/// Dimensions after fitting `(width, height)` into a `max` x `max` box.
pub fn target_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    let largest = width.max(height);
    if largest <= max {
        return (width, height);
    }

    let scale = max as f64 / largest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);

    if width >= height {
        (max, scaled(height))
    } else {
        (scaled(width), max)
    }
}

#[derive(Debug, Clone)]
pub struct Resizer {
    max_dimension: u32,
}

impl Default for Resizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

impl Resizer {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Resize `data`, blocking the calling thread while decoding and
    /// encoding. Use [`Resizer::resize_async`] from async code.
    pub fn resize(&self, data: &[u8]) -> Result<ResizedImage> {
        let detected = image::guess_format(data).ok();
        let img = match detected {
            Some(format) => image::load_from_memory_with_format(data, format),
            None => image::load_from_memory(data),
        }
        .map_err(|e| PipelineError::Decode(e.to_string()))?;

        let (orig_w, orig_h) = img.dimensions();
        let (new_w, new_h) = target_dimensions(orig_w, orig_h, self.max_dimension);
        let format = output_format(detected);
        let resized = (new_w, new_h) != (orig_w, orig_h);

        debug!(
            original_width = orig_w,
            original_height = orig_h,
            width = new_w,
            height = new_h,
            format = format_name(format),
            "Resizing image"
        );

        // Nothing to do: hand back the original encoding untouched
        if !resized && Some(format) == detected {
            return Ok(ResizedImage {
                data: Bytes::copy_from_slice(data),
                format,
                width: orig_w,
                height: orig_h,
                resized: false,
            });
        }

        let output = if resized {
            img.resize_exact(new_w, new_h, FilterType::Lanczos3)
        } else {
            img
        };

        let data = encode(&output, format)?;

        Ok(ResizedImage {
            data,
            format,
            width: new_w,
            height: new_h,
            resized,
        })
    }

    /// Runs [`Resizer::resize`] on the blocking thread pool.
    pub async fn resize_async(&self, data: Bytes) -> Result<ResizedImage> {
        let resizer = self.clone();
        tokio::task::spawn_blocking(move || resizer.resize(&data)).await?
    }
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Bytes> {
    let mut out = Cursor::new(Vec::new());

    let res = match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel and no 16-bit depth
            let img = match img {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img.clone(),
                other => DynamicImage::ImageRgb8(other.to_rgb8()),
            };
            img.write_to(&mut out, ImageOutputFormat::Jpeg(JPEG_QUALITY))
        }
        ImageFormat::Png => img.write_to(&mut out, ImageOutputFormat::Png),
        ImageFormat::Gif => img.write_to(&mut out, ImageOutputFormat::Gif),
        other => {
            return Err(PipelineError::Encode(format!(
                "unsupported output format {}",
                format_name(other)
            )));
        }
    };

    res.map_err(|e| PipelineError::Encode(e.to_string()))?;
    Ok(Bytes::from(out.into_inner()))
}
