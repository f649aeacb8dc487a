//! In-process MuPDF rasterizer
//!
//! MuPDF documents are not `Send`, so every call reopens the document inside
//! the blocking task that uses it.

use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::{run_blocking, BackendError, BackendResult, RenderBackend};
use crate::pdf::resize::encode_image;
use crate::pdf::{PdfDocument, RasterOptions, RenderedPage};
use crate::scratch::ScratchDir;

const PDF_MIME: &str = "application/pdf";

pub struct MupdfBackend {
    timeout: Duration,
}

impl MupdfBackend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RenderBackend for MupdfBackend {
    fn name(&self) -> &'static str {
        "mupdf"
    }

    async fn page_count(&self, doc: &PdfDocument, _scratch: &ScratchDir) -> BackendResult<u32> {
        let bytes = doc.shared();
        run_blocking(self.timeout, move || {
            let document = Document::from_bytes(&bytes, PDF_MIME)?;
            Ok(document.page_count()?.max(0) as u32)
        })
        .await
    }

    async fn extract_page(
        &self,
        _doc: &PdfDocument,
        _scratch: &ScratchDir,
        _page: u32,
    ) -> BackendResult<Vec<u8>> {
        Err(BackendError::Unsupported {
            engine: "mupdf",
            operation: "page extraction",
        })
    }

    async fn rasterize(
        &self,
        doc: &PdfDocument,
        _scratch: &ScratchDir,
        pages: &[u32],
        options: &RasterOptions,
    ) -> BackendResult<Vec<RenderedPage>> {
        let bytes = doc.shared();
        let pages = pages.to_vec();
        let options = *options;

        run_blocking(self.timeout, move || {
            let document = Document::from_bytes(&bytes, PDF_MIME)?;
            let total = document.page_count()?.max(0) as u32;
            let scale = options.scale();
            let colorspace = Colorspace::device_rgb();

            let mut rendered = Vec::with_capacity(pages.len());
            for page in pages {
                if page == 0 || page > total {
                    return Err(BackendError::PageOutOfRange { page, total });
                }
                let loaded = document.load_page(page as i32 - 1)?;
                let matrix = Matrix::new_scale(scale, scale);
                let pixmap = loaded.to_pixmap(&matrix, &colorspace, true, true)?;
                let image = pixmap_to_image(&pixmap)?;

                rendered.push(RenderedPage {
                    page,
                    data: encode_image(&image, options.format, options.jpeg_quality)?,
                    format: options.format,
                });
            }
            Ok(rendered)
        })
        .await
    }
}

/// Copy pixmap samples into an RGBA image, padding a missing alpha channel
fn pixmap_to_image(pixmap: &Pixmap) -> BackendResult<DynamicImage> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for pixel in samples.chunks_exact(n.max(1)) {
        let r = pixel.first().copied().unwrap_or(0);
        let g = pixel.get(1).copied().unwrap_or(r);
        let b = pixel.get(2).copied().unwrap_or(r);
        let a = if n >= 4 { pixel[3] } else { 255 };
        rgba.extend_from_slice(&[r, g, b, a]);
    }

    RgbaImage::from_raw(width, height, rgba)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| BackendError::Image("pixmap size does not match its samples".to_string()))
}
