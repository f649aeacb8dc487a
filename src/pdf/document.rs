//! Decoded PDF payload

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// A PDF held in memory for the lifetime of one request
///
/// Cloning is cheap; the bytes are shared so they can move into blocking
/// tasks without copying.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    label: &'static str,
    bytes: Arc<Vec<u8>>,
}

impl PdfDocument {
    pub fn new(label: &'static str, bytes: Vec<u8>) -> Self {
        Self {
            label,
            bytes: Arc::new(bytes),
        }
    }

    /// The document as submitted by the client
    pub fn source(bytes: Vec<u8>) -> Self {
        Self::new("source", bytes)
    }

    /// Name used for the staged copy in a scratch directory
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Decode a base64 PDF payload
///
/// Accepts an optional `data:...;base64,` prefix and ignores embedded
/// whitespace (line-wrapped encoders).
pub fn decode_base64_pdf(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match input.trim().split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => input.trim(),
    };

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64.decode(compact.as_bytes())
}
