//! Ghostscript engine
//!
//! A single `gs` binary covers all three operations: a PostScript one-liner
//! for the page count, `pdfwrite` for extraction and `png16m`/`jpeg` for
//! rasterization.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::process::Tool;
use super::{read_output, BackendError, BackendResult, RenderBackend};
use crate::pdf::{ImageFormat, PdfDocument, RasterOptions, RenderedPage};
use crate::scratch::ScratchDir;

pub struct GhostscriptBackend {
    gs: Tool,
    timeout: Duration,
}

impl GhostscriptBackend {
    pub fn new(gs: &str, timeout: Duration) -> Self {
        Self {
            gs: Tool::new("ghostscript", gs),
            timeout,
        }
    }

    /// SAFER stays on; only the staged input is readable from PostScript
    fn count_args(input: &Path) -> Vec<OsString> {
        let program = format!(
            "({}) (r) file runpdfbegin pdfpagecount = quit",
            ps_string(&input.to_string_lossy())
        );
        let mut permit = OsString::from("--permit-file-read=");
        permit.push(input);
        tool_args![
            "-q",
            "-dNODISPLAY",
            "-dSAFER",
            permit,
            "-dBATCH",
            "-dNOPAUSE",
            "-c",
            program,
        ]
    }

    fn extract_args(input: &Path, output: &Path, page: u32) -> Vec<OsString> {
        let mut out = OsString::from("-sOutputFile=");
        out.push(output);
        tool_args![
            "-q",
            "-dBATCH",
            "-dNOPAUSE",
            "-dSAFER",
            "-sDEVICE=pdfwrite",
            format!("-dFirstPage={}", page),
            format!("-dLastPage={}", page),
            out,
            input,
        ]
    }

    fn raster_args(input: &Path, output: &Path, page: u32, options: &RasterOptions) -> Vec<OsString> {
        let device = match options.format {
            ImageFormat::Png => "-sDEVICE=png16m",
            ImageFormat::Jpeg => "-sDEVICE=jpeg",
        };
        let mut out = OsString::from("-sOutputFile=");
        out.push(output);

        let mut args = tool_args![
            "-q",
            "-dBATCH",
            "-dNOPAUSE",
            "-dSAFER",
            device,
            format!("-r{}", options.dpi),
            "-dTextAlphaBits=4",
            "-dGraphicsAlphaBits=4",
            format!("-dFirstPage={}", page),
            format!("-dLastPage={}", page),
        ];
        if options.format == ImageFormat::Jpeg {
            args.push(format!("-dJPEGQ={}", options.jpeg_quality).into());
        }
        args.push(out);
        args.push(input.into());
        args
    }
}

/// Escape a value for use inside a PostScript string literal
fn ps_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// The page count is the last non-empty line Ghostscript prints
pub(crate) fn parse_page_count(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse().ok())
}

#[async_trait]
impl RenderBackend for GhostscriptBackend {
    fn name(&self) -> &'static str {
        "ghostscript"
    }

    async fn page_count(&self, doc: &PdfDocument, scratch: &ScratchDir) -> BackendResult<u32> {
        let input = scratch.stage(doc).await?;
        let output = self.gs.run(&Self::count_args(&input), self.timeout).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        parse_page_count(&stdout).ok_or_else(|| {
            BackendError::InvalidOutput(format!(
                "ghostscript did not report a page count: {}",
                stdout.trim()
            ))
        })
    }

    async fn extract_page(
        &self,
        doc: &PdfDocument,
        scratch: &ScratchDir,
        page: u32,
    ) -> BackendResult<Vec<u8>> {
        let input = scratch.stage(doc).await?;
        let output = scratch.file(&format!("{}-split-{}.pdf", doc.label(), page));

        self.gs
            .run(&Self::extract_args(&input, &output, page), self.timeout)
            .await?;

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
            let output = scratch.file(&format!(
                "raster-{:04}.{}",
                position,
                options.format.extension()
            ));
            let args = Self::raster_args(&input, &output, page, options);
            self.gs.run(&args, self.timeout).await?;

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
