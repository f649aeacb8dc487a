//! PDF handling
//!
//! Engine-independent pieces of the pipeline:
//!
//! - `document`: the decoded request payload
//! - `split`: single-page extraction with lopdf
//! - `flatten`: best-effort baking of form widgets into page content
//! - `resize`: re-encoding and size-capped downscaling of rendered pages

mod document;
pub mod flatten;
pub mod resize;
pub mod split;
mod types;

pub use document::{decode_base64_pdf, PdfDocument};
pub use types::{ImageFormat, RasterOptions, RenderedPage, SplitPage};

#[cfg(test)]
pub(crate) mod fixtures;
