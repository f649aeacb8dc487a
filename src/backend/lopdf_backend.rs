//! Pure-Rust engine backed by lopdf
//!
//! Handles counting and splitting in-process without touching the scratch
//! directory. It cannot render.

use std::time::Duration;

use async_trait::async_trait;

use super::{run_blocking, BackendError, BackendResult, RenderBackend};
use crate::pdf::{split, PdfDocument, RasterOptions, RenderedPage, SplitPage};
use crate::scratch::ScratchDir;

pub struct LopdfBackend {
    timeout: Duration,
}

impl LopdfBackend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RenderBackend for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    async fn page_count(&self, doc: &PdfDocument, _scratch: &ScratchDir) -> BackendResult<u32> {
        let bytes = doc.shared();
        run_blocking(self.timeout, move || split::count_pages(&bytes)).await
    }

    async fn extract_page(
        &self,
        doc: &PdfDocument,
        _scratch: &ScratchDir,
        page: u32,
    ) -> BackendResult<Vec<u8>> {
        let bytes = doc.shared();
        run_blocking(self.timeout, move || {
            let source = split::load(&bytes)?;
            split::extract_page(&source, page)
        })
        .await
    }

    /// Parses the source once for the whole batch
    async fn extract_pages(
        &self,
        doc: &PdfDocument,
        _scratch: &ScratchDir,
        pages: &[u32],
    ) -> BackendResult<Vec<SplitPage>> {
        let bytes = doc.shared();
        let wanted = pages.to_vec();
        let extracted = run_blocking(self.timeout, move || split::extract_pages(&bytes, &wanted)).await?;

        Ok(pages
            .iter()
            .zip(extracted)
            .map(|(&page, data)| SplitPage { page, data })
            .collect())
    }

    async fn rasterize(
        &self,
        _doc: &PdfDocument,
        _scratch: &ScratchDir,
        _pages: &[u32],
        _options: &RasterOptions,
    ) -> BackendResult<Vec<RenderedPage>> {
        Err(BackendError::Unsupported {
            engine: "lopdf",
            operation: "rasterization",
        })
    }
}
