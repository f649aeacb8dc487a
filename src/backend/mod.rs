//! Page extraction and rendering engines
//!
//! Every engine implements [`RenderBackend`]; the service layer only talks
//! to the trait. Engines backed by external binaries stage the document in
//! the request's scratch directory and read their output back from it.
//!
//! | Engine        | count | extract | rasterize |
//! |---------------|-------|---------|-----------|
//! | `lopdf`       | yes   | yes     | no        |
//! | `poppler`     | yes   | yes     | yes       |
//! | `ghostscript` | yes   | yes     | yes       |
//! | `mupdf`       | yes   | no      | yes       |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Build an argument list from mixed string and path values
macro_rules! tool_args {
    ($($arg:expr),* $(,)?) => {
        vec![$(::std::ffi::OsString::from($arg)),*]
    };
}

mod error;
mod ghostscript;
mod lopdf_backend;
#[cfg(feature = "mupdf")]
mod mupdf_backend;
mod poppler;
pub mod process;

pub use error::{BackendError, BackendResult};
pub use ghostscript::GhostscriptBackend;
pub use lopdf_backend::LopdfBackend;
#[cfg(feature = "mupdf")]
pub use mupdf_backend::MupdfBackend;
pub use poppler::PopplerBackend;

use crate::config::Config;
use crate::pdf::{PdfDocument, RasterOptions, RenderedPage, SplitPage};
use crate::scratch::ScratchDir;

/// Page extraction and rendering capability of one engine
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &'static str;

    /// Number of pages in the document
    async fn page_count(&self, doc: &PdfDocument, scratch: &ScratchDir) -> BackendResult<u32>;

    /// Extract one 1-based page into a standalone PDF
    async fn extract_page(
        &self,
        doc: &PdfDocument,
        scratch: &ScratchDir,
        page: u32,
    ) -> BackendResult<Vec<u8>>;

    /// Extract several pages, in the given order
    async fn extract_pages(
        &self,
        doc: &PdfDocument,
        scratch: &ScratchDir,
        pages: &[u32],
    ) -> BackendResult<Vec<SplitPage>> {
        let mut out = Vec::with_capacity(pages.len());
        for &page in pages {
            let data = self.extract_page(doc, scratch, page).await?;
            out.push(SplitPage { page, data });
        }
        Ok(out)
    }

    /// Render the given pages, one image per entry, in the given order
    async fn rasterize(
        &self,
        doc: &PdfDocument,
        scratch: &ScratchDir,
        pages: &[u32],
        options: &RasterOptions,
    ) -> BackendResult<Vec<RenderedPage>>;
}

/// Available engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Lopdf,
    Poppler,
    Ghostscript,
    #[cfg(feature = "mupdf")]
    Mupdf,
}

impl Engine {
    pub fn can_split(&self) -> bool {
        match self {
            Engine::Lopdf | Engine::Poppler | Engine::Ghostscript => true,
            #[cfg(feature = "mupdf")]
            Engine::Mupdf => false,
        }
    }

    pub fn can_rasterize(&self) -> bool {
        match self {
            Engine::Lopdf => false,
            Engine::Poppler | Engine::Ghostscript => true,
            #[cfg(feature = "mupdf")]
            Engine::Mupdf => true,
        }
    }

    /// Instantiate the engine from configuration
    pub fn build(&self, config: &Config) -> Arc<dyn RenderBackend> {
        let timeout = config.backend_timeout;
        let engines = &config.engines;
        match self {
            Engine::Lopdf => Arc::new(LopdfBackend::new(timeout)),
            Engine::Poppler => Arc::new(PopplerBackend::new(
                &engines.pdfinfo_bin,
                &engines.pdfseparate_bin,
                &engines.pdftoppm_bin,
                timeout,
            )),
            Engine::Ghostscript => Arc::new(GhostscriptBackend::new(&engines.ghostscript_bin, timeout)),
            #[cfg(feature = "mupdf")]
            Engine::Mupdf => Arc::new(MupdfBackend::new(timeout)),
        }
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lopdf" | "native" => Ok(Engine::Lopdf),
            "poppler" => Ok(Engine::Poppler),
            "ghostscript" | "gs" => Ok(Engine::Ghostscript),
            #[cfg(feature = "mupdf")]
            "mupdf" => Ok(Engine::Mupdf),
            #[cfg(not(feature = "mupdf"))]
            "mupdf" => Err("mupdf support is not compiled in (enable the `mupdf` feature)".to_string()),
            other => Err(format!("unknown engine '{}'", other)),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Engine::Lopdf => "lopdf",
            Engine::Poppler => "poppler",
            Engine::Ghostscript => "ghostscript",
            #[cfg(feature = "mupdf")]
            Engine::Mupdf => "mupdf",
        };
        f.write_str(name)
    }
}

/// Run CPU-bound engine work on the blocking pool, bounded by `timeout`
pub(crate) async fn run_blocking<F, T>(timeout: Duration, f: F) -> BackendResult<T>
where
    F: FnOnce() -> BackendResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(joined) => joined.map_err(|e| BackendError::Join(e.to_string()))?,
        Err(_) => Err(BackendError::Timeout(timeout.as_secs())),
    }
}

/// Read an engine output file, mapping a missing file to `MissingOutput`
pub(crate) async fn read_output(path: &std::path::Path, page: u32) -> BackendResult<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(data) if !data.is_empty() => Ok(data),
        Ok(_) => Err(BackendError::MissingOutput(page)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BackendError::MissingOutput(page)),
        Err(e) => Err(BackendError::Io(e)),
    }
}
