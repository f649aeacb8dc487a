//! Per-request scratch directories
//!
//! Every request that may touch the filesystem gets its own directory under
//! the configured temp root, named after the request id. The directory and
//! everything in it is removed when the `ScratchDir` is dropped, on success
//! and on every error path. Removal failures are logged and swallowed.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::pdf::PdfDocument;

/// Prefix shared by all scratch directories
pub const SCRATCH_PREFIX: &str = "pdfpages-";

pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
    request_id: Uuid,
}

impl ScratchDir {
    /// Create `<root>/pdfpages-<request_id>-XXXXXX`
    pub fn create(root: &Path, request_id: Uuid) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}-", SCRATCH_PREFIX, request_id))
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();

        tracing::debug!("Created scratch directory {}", path.display());

        Ok(Self {
            dir: Some(dir),
            path,
            request_id,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the scratch directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Write `doc` into the directory once and return its path
    ///
    /// The file is named after the document label, so repeated calls for
    /// the same document reuse the staged copy.
    pub async fn stage(&self, doc: &PdfDocument) -> io::Result<PathBuf> {
        let path = self.file(&format!("{}.pdf", doc.label()));
        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::write(&path, doc.bytes()).await?;
        }
        Ok(path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                tracing::warn!(
                    "Failed to remove scratch directory {} for request {}: {}",
                    self.path.display(),
                    self.request_id,
                    e
                );
            }
        }
    }
}
