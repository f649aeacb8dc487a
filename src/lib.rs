//! PDF page server
//!
//! Splits PDFs into standalone single-page documents and renders pages to
//! PNG or JPEG images over a small JSON API. Page extraction and rendering
//! are delegated to pluggable engines (lopdf, Poppler, Ghostscript and
//! optionally MuPDF).

pub mod backend;
pub mod config;
pub mod error;
pub mod pdf;
pub mod routes;
pub mod scratch;
pub mod service;
pub mod state;
pub mod validation;

pub use config::Config;
pub use error::{AppError, Result};
pub use routes::create_router;
pub use state::AppState;
