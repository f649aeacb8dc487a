//! Split and convert pipelines
//!
//! Each call owns a scratch directory for its whole duration. The directory
//! is dropped before the result is handed back, whether the call succeeded
//! or not.

use std::sync::Arc;

use uuid::Uuid;

use crate::backend::{run_blocking, BackendError, RenderBackend};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::pdf::flatten::flatten_or_original;
use crate::pdf::resize::fit_within;
use crate::pdf::{PdfDocument, RasterOptions, RenderedPage, SplitPage};
use crate::scratch::ScratchDir;
use crate::validation::{resolve_page, resolve_pages, PageList, PageParam};

/// Result of a split request
#[derive(Debug)]
pub enum SplitOutcome {
    /// One selected page
    Single { page: u32, total: u32, data: Vec<u8> },
    /// Every page of the document, ascending
    All(Vec<SplitPage>),
}

/// Validated convert parameters
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub pages: Option<PageList>,
    pub max_bytes: u64,
    pub raster: RasterOptions,
}

pub struct PageService {
    config: Config,
    splitter: Arc<dyn RenderBackend>,
    rasterizer: Arc<dyn RenderBackend>,
}

impl PageService {
    pub fn new(
        config: Config,
        splitter: Arc<dyn RenderBackend>,
        rasterizer: Arc<dyn RenderBackend>,
    ) -> Self {
        Self {
            config,
            splitter,
            rasterizer,
        }
    }

    pub fn splitter_name(&self) -> &'static str {
        self.splitter.name()
    }

    pub fn rasterizer_name(&self) -> &'static str {
        self.rasterizer.name()
    }

    fn scratch(&self, request_id: Uuid) -> Result<ScratchDir> {
        ScratchDir::create(&self.config.temp_dir, request_id).map_err(|e| {
            AppError::Internal(format!(
                "Failed to create scratch directory in {}: {}",
                self.config.temp_dir.display(),
                e
            ))
        })
    }

    /// Split `doc` into single-page PDFs, or extract the selected page
    pub async fn split(
        &self,
        request_id: Uuid,
        doc: PdfDocument,
        page: Option<&PageParam>,
    ) -> Result<SplitOutcome> {
        let scratch = self.scratch(request_id)?;
        let total = self.splitter.page_count(&doc, &scratch).await?;

        tracing::debug!(
            "Splitting {} byte PDF with {} pages using {}",
            doc.len(),
            total,
            self.splitter.name()
        );

        match page {
            Some(param) => {
                let page = resolve_page(param, total)?;
                let data = self.splitter.extract_page(&doc, &scratch, page).await?;
                Ok(SplitOutcome::Single { page, total, data })
            }
            None => {
                let all: Vec<u32> = (1..=total).collect();
                let pages = self.splitter.extract_pages(&doc, &scratch, &all).await?;
                Ok(SplitOutcome::All(pages))
            }
        }
    }

    /// Render the selected pages, capping each image at `max_bytes`
    pub async fn convert(
        &self,
        request_id: Uuid,
        doc: PdfDocument,
        options: ConvertOptions,
    ) -> Result<Vec<RenderedPage>> {
        let scratch = self.scratch(request_id)?;
        let total = self.rasterizer.page_count(&doc, &scratch).await?;
        let pages = resolve_pages(options.pages.as_ref(), total)?;
        if pages.is_empty() {
            return Ok(Vec::new());
        }

        let doc = if self.config.render.flatten_forms {
            flatten_or_original(doc, self.config.backend_timeout).await
        } else {
            doc
        };

        tracing::debug!(
            "Rendering pages {:?} of {} at {} dpi as {} using {}",
            pages,
            total,
            options.raster.dpi,
            options.raster.format,
            self.rasterizer.name()
        );

        let rendered = self
            .rasterizer
            .rasterize(&doc, &scratch, &pages, &options.raster)
            .await?;
        if rendered.len() != pages.len() {
            return Err(BackendError::InvalidOutput(format!(
                "{} rendered {} images for {} requested pages",
                self.rasterizer.name(),
                rendered.len(),
                pages.len()
            ))
            .into());
        }
        drop(scratch);

        let max_bytes = options.max_bytes;
        let quality = options.raster.jpeg_quality;
        let fitted: Vec<RenderedPage> = run_blocking(self.config.backend_timeout, move || {
            rendered
                .into_iter()
                .map(|page| fit_within(page, max_bytes, quality))
                .collect()
        })
        .await?;

        Ok(fitted)
    }
}
