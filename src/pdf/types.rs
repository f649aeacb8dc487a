//! Page result types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Raster output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    /// File extension used by the command-line engines
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    pub fn as_image_format(&self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            other => Err(format!("unsupported image format '{}'", other)),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Png => f.write_str("png"),
            ImageFormat::Jpeg => f.write_str("jpeg"),
        }
    }
}

/// Rendering parameters for one convert request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    pub dpi: u32,
    pub format: ImageFormat,
    /// Quality for lossy formats (1-100)
    pub jpeg_quality: u8,
}

impl RasterOptions {
    /// Scale factor relative to PDF user space (72 points per inch)
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            dpi: 200,
            format: ImageFormat::Png,
            jpeg_quality: 85,
        }
    }
}

/// A standalone single-page PDF cut from a source document
#[derive(Debug, Clone)]
pub struct SplitPage {
    /// 1-based position in the source document
    pub page: u32,
    pub data: Vec<u8>,
}

/// An encoded raster image of one page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-based position in the source document
    pub page: u32,
    pub data: Vec<u8>,
    pub format: ImageFormat,
}

impl RenderedPage {
    /// Encoded size in megabytes (1 MB = 1024 * 1024 bytes)
    pub fn size_mb(&self) -> f64 {
        self.data.len() as f64 / (1024.0 * 1024.0)
    }
}
