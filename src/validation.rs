//! Request field validation
//!
//! Checks that need nothing but the request body run before any engine is
//! touched. Page selectors can only be checked once the page count is known.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::pdf::{decode_base64_pdf, ImageFormat, PdfDocument};

pub const MIN_DPI: i64 = 36;
pub const MAX_DPI: i64 = 600;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A page selector as clients send it: `3`, `3.0` or `"3"`
///
/// Any other JSON value is kept as `Other` so that it is reported as an
/// invalid page once the page count is known.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PageParam {
    Integer(i64),
    Float(f64),
    Text(String),
    Other(Value),
}

/// The `pages` field: a list of selectors, or anything else
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PageList {
    List(Vec<PageParam>),
    Other(Value),
}

impl From<Vec<PageParam>> for PageList {
    fn from(params: Vec<PageParam>) -> Self {
        PageList::List(params)
    }
}

impl PageParam {
    /// The selector as a whole number, if it is one
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PageParam::Integer(n) => Some(*n),
            PageParam::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            PageParam::Float(_) => None,
            PageParam::Text(s) => s.trim().parse().ok(),
            PageParam::Other(_) => None,
        }
    }
}

impl From<i64> for PageParam {
    fn from(n: i64) -> Self {
        PageParam::Integer(n)
    }
}

/// Decode the `pdf` field, rejecting absent, empty and undecodable payloads
pub fn require_pdf(pdf: Option<&str>) -> Result<PdfDocument> {
    let pdf = match pdf {
        Some(pdf) if !pdf.trim().is_empty() => pdf,
        _ => return Err(AppError::pdf_required()),
    };

    let bytes = decode_base64_pdf(pdf).map_err(|e| {
        tracing::debug!("Base64 decode failed: {}", e);
        AppError::validation("Invalid base64 PDF data")
    })?;
    if bytes.is_empty() {
        return Err(AppError::pdf_required());
    }

    Ok(PdfDocument::source(bytes))
}

/// Check one selector against the document's page count
pub fn resolve_page(param: &PageParam, total: u32) -> Result<u32> {
    match param.as_integer() {
        Some(n) if n >= 1 && n <= total as i64 => Ok(n as u32),
        _ => Err(AppError::invalid_page(total)),
    }
}

/// Resolve a page list; absent or empty means every page, ascending
pub fn resolve_pages(pages: Option<&PageList>, total: u32) -> Result<Vec<u32>> {
    match pages {
        Some(PageList::List(params)) if !params.is_empty() => params
            .iter()
            .map(|param| resolve_page(param, total))
            .collect(),
        Some(PageList::Other(_)) => Err(AppError::invalid_page(total)),
        _ => Ok((1..=total).collect()),
    }
}

/// Size cap in bytes from a `maxSize` in megabytes
pub fn max_size_bytes(max_size_mb: Option<&Value>, default_mb: f64) -> Result<u64> {
    let mb = match max_size_mb {
        None => default_mb,
        Some(value) => value
            .as_f64()
            .ok_or_else(|| AppError::validation("Invalid maxSize"))?,
    };
    if !mb.is_finite() || mb <= 0.0 {
        return Err(AppError::validation("Invalid maxSize"));
    }
    Ok((mb * BYTES_PER_MB).round().max(1.0) as u64)
}

/// Whole-number dpi within the supported range; `300.0` counts as whole
pub fn resolve_dpi(dpi: Option<&Value>, default: u32) -> Result<u32> {
    let Some(value) = dpi else {
        return Ok(default);
    };
    let dpi = value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    });
    match dpi {
        Some(dpi) if (MIN_DPI..=MAX_DPI).contains(&dpi) => Ok(dpi as u32),
        _ => Err(AppError::validation("Invalid dpi")),
    }
}

pub fn resolve_format(format: Option<&Value>, default: ImageFormat) -> Result<ImageFormat> {
    match format {
        None => Ok(default),
        Some(Value::String(format)) => format
            .parse()
            .map_err(|_| AppError::validation("Invalid image format")),
        Some(_) => Err(AppError::validation("Invalid image format")),
    }
}
