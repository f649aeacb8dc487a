//! Poppler command-line engine
//!
//! - `pdfinfo` for the page count
//! - `pdfseparate` for single-page extraction
//! - `pdftoppm` for rasterization, one invocation per requested page
//!
//! Raster output files are named after the request position rather than the
//! page number, so duplicate and unordered page lists map back unambiguously.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::process::Tool;
use super::{read_output, BackendError, BackendResult, RenderBackend};
use crate::pdf::{ImageFormat, PdfDocument, RasterOptions, RenderedPage};
use crate::scratch::ScratchDir;

pub struct PopplerBackend {
    pdfinfo: Tool,
    pdfseparate: Tool,
    pdftoppm: Tool,
    timeout: Duration,
}

impl PopplerBackend {
    pub fn new(pdfinfo: &str, pdfseparate: &str, pdftoppm: &str, timeout: Duration) -> Self {
        Self {
            pdfinfo: Tool::new("pdfinfo", pdfinfo),
            pdfseparate: Tool::new("pdfseparate", pdfseparate),
            pdftoppm: Tool::new("pdftoppm", pdftoppm),
            timeout,
        }
    }

    fn raster_args(
        input: &Path,
        prefix: &Path,
        page: u32,
        options: &RasterOptions,
    ) -> Vec<std::ffi::OsString> {
        let page = page.to_string();
        let mut args = tool_args![
            "-f",
            &page,
            "-l",
            &page,
            "-r",
            options.dpi.to_string(),
            "-singlefile",
        ];
        match options.format {
            ImageFormat::Png => args.push("-png".into()),
            ImageFormat::Jpeg => {
                args.push("-jpeg".into());
                args.push("-jpegopt".into());
                args.push(format!("quality={}", options.jpeg_quality).into());
            }
        }
        args.push(input.into());
        args.push(prefix.into());
        args
    }
}

/// Parse the `Pages:` line of `pdfinfo` output
pub(crate) fn parse_pdfinfo_pages(stdout: &str) -> Option<u32> {
    stdout.lines().find_map(|line| {
        let rest = line.strip_prefix("Pages:")?;
        rest.trim().parse().ok()
    })
}

#[async_trait]
impl RenderBackend for PopplerBackend {
    fn name(&self) -> &'static str {
        "poppler"
    }

    async fn page_count(&self, doc: &PdfDocument, scratch: &ScratchDir) -> BackendResult<u32> {
        let input = scratch.stage(doc).await?;
        let output = self.pdfinfo.run(&tool_args![&input], self.timeout).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        parse_pdfinfo_pages(&stdout).ok_or_else(|| {
            BackendError::InvalidOutput("pdfinfo did not report a page count".to_string())
        })
    }

    async fn extract_page(
        &self,
        doc: &PdfDocument,
        scratch: &ScratchDir,
        page: u32,
    ) -> BackendResult<Vec<u8>> {
        let input = scratch.stage(doc).await?;
        let pattern = scratch.file(&format!("{}-split-%d.pdf", doc.label()));
        let page_arg = page.to_string();

        self.pdfseparate
            .run(
                &tool_args!["-f", &page_arg, "-l", &page_arg, &input, &pattern],
                self.timeout,
            )
            .await?;

        let output = scratch.file(&format!("{}-split-{}.pdf", doc.label(), page));
        read_output(&output, page).await
    }

    async fn rasterize(
        &self,
        doc: &PdfDocument,
        scratch: &ScratchDir,
        pages: &[u32],
        options: &RasterOptions,
    ) -> BackendResult<Vec<RenderedPage>> {
        let input = scratch.stage(doc).await?;
        let mut rendered = Vec::with_capacity(pages.len());

        for (position, &page) in pages.iter().enumerate() {
            let prefix = scratch.file(&format!("raster-{:04}", position));
            let args = Self::raster_args(&input, &prefix, page, options);
            self.pdftoppm.run(&args, self.timeout).await?;

            let output = prefix.with_extension(options.format.extension());
            let data = read_output(&output, page).await?;
            rendered.push(RenderedPage {
                page,
                data,
                format: options.format,
            });
        }

        Ok(rendered)
    }
}
