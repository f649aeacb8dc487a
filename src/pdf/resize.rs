//! Image encoding and size-capped downscaling
//!
//! Encoded size grows roughly with pixel area, so an oversized image is
//! shrunk once by `sqrt(max / actual)` with a 10% margin on top.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use super::{ImageFormat, RenderedPage};
use crate::backend::{BackendError, BackendResult};

/// Fraction of the ideal scale actually applied
const SIZE_MARGIN: f64 = 0.9;

/// Encode an image in the requested format
pub fn encode_image(
    image: &DynamicImage,
    format: ImageFormat,
    jpeg_quality: u8,
) -> BackendResult<Vec<u8>> {
    let mut output = Vec::new();
    match format {
        ImageFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
                .map_err(|e| BackendError::Image(e.to_string()))?;
        }
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut output, jpeg_quality.clamp(1, 100));
            rgb.write_with_encoder(encoder)
                .map_err(|e| BackendError::Image(e.to_string()))?;
        }
    }
    Ok(output)
}

/// Scale factor that should bring `actual_bytes` under `max_bytes`
pub fn downscale_factor(max_bytes: u64, actual_bytes: u64) -> f64 {
    if actual_bytes == 0 || actual_bytes <= max_bytes {
        return 1.0;
    }
    (max_bytes as f64 / actual_bytes as f64).sqrt() * SIZE_MARGIN
}

/// Target dimensions for a scale factor, never below one pixel
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let w = ((width as f64) * factor).round().max(1.0) as u32;
    let h = ((height as f64) * factor).round().max(1.0) as u32;
    (w, h)
}

/// Downscale `page` if its encoding exceeds `max_bytes`
///
/// A single isotropic pass is applied. If the result is still above the cap
/// it is returned as is.
pub fn fit_within(page: RenderedPage, max_bytes: u64, jpeg_quality: u8) -> BackendResult<RenderedPage> {
    let actual = page.data.len() as u64;
    if actual <= max_bytes {
        return Ok(page);
    }

    let factor = downscale_factor(max_bytes, actual);
    let image = image::load_from_memory_with_format(&page.data, page.format.as_image_format())
        .map_err(|e| BackendError::Image(e.to_string()))?;
    let (width, height) = scaled_dimensions(image.width(), image.height(), factor);

    let resized = image.resize_exact(width, height, FilterType::Lanczos3);
    let data = encode_image(&resized, page.format, jpeg_quality)?;

    tracing::info!(
        "Downscaled page {} from {}x{} ({} bytes) to {}x{} ({} bytes), factor {:.3}",
        page.page,
        image.width(),
        image.height(),
        actual,
        width,
        height,
        data.len(),
        factor
    );

    if data.len() as u64 > max_bytes {
        tracing::warn!(
            "Page {} is still {} bytes after downscaling (cap {} bytes)",
            page.page,
            data.len(),
            max_bytes
        );
    }

    Ok(RenderedPage {
        page: page.page,
        data,
        format: page.format,
    })
}
