//! Shared helpers for router tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::Value;
use tower::ServiceExt;

use pdf_pages_server::backend::{BackendError, BackendResult, LopdfBackend, RenderBackend};
use pdf_pages_server::pdf::resize::encode_image;
use pdf_pages_server::pdf::{split, PdfDocument, RasterOptions, RenderedPage};
use pdf_pages_server::scratch::ScratchDir;
use pdf_pages_server::{create_router, AppState, Config};

fn rect(width: i64, height: i64) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(width),
        Object::Integer(height),
    ])
}

/// A PDF with one page per `(width, height)` entry
pub fn sized_pdf(sizes: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for (index, &(width, height)) in sizes.iter().enumerate() {
        let text = format!("BT /F1 18 Tf 20 20 Td (Page {}) Tj ET", index + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, text.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => rect(width, height),
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// One page with a filled text field whose appearance stream is present
pub fn form_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let appearance_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => rect(200, 20),
        },
        b"BT /Helv 12 Tf 2 5 Td (Jane Doe) Tj ET".to_vec(),
    ));
    let field_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("name"),
        "V" => Object::string_literal("Jane Doe"),
        "Rect" => vec![
            Object::Integer(100),
            Object::Integer(600),
            Object::Integer(300),
            Object::Integer(620),
        ],
        "P" => Object::Reference(page_id),
        "AP" => dictionary! { "N" => Object::Reference(appearance_id) },
    });

    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        b"BT /F1 18 Tf 20 20 Td (Form) Tj ET".to_vec(),
    ));
    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => rect(612, 792),
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
            "Annots" => vec![Object::Reference(field_id)],
        }),
    );
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
        "AcroForm" => dictionary! {
            "Fields" => vec![Object::Reference(field_id)],
            "DR" => dictionary! {
                "Font" => dictionary! { "Helv" => Object::Reference(font_id) },
            },
        },
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Pages whose width identifies them: page `n` is `100 + 10n` points wide
pub fn numbered_pdf(count: i64) -> Vec<u8> {
    let sizes: Vec<(i64, i64)> = (1..=count).map(|n| (100 + 10 * n, 100)).collect();
    sized_pdf(&sizes)
}

pub fn encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode(value: &Value) -> Vec<u8> {
    BASE64.decode(value.as_str().unwrap()).unwrap()
}

/// Widths and heights of every page of an encoded PDF
pub fn page_sizes(bytes: &[u8]) -> Vec<(f32, f32)> {
    let doc = split::load(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| split::media_box_size(&doc, id).unwrap())
        .collect()
}

/// Deterministic noise, which PNG cannot compress much
pub fn noise_image(width: u32, height: u32) -> DynamicImage {
    let mut state: u32 = 0x9e37_79b9;
    let img = RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    });
    DynamicImage::ImageRgb8(img)
}

/// Rasterizer that draws noise at each page's MediaBox size scaled by dpi
pub struct NoiseRasterizer;

#[async_trait]
impl RenderBackend for NoiseRasterizer {
    fn name(&self) -> &'static str {
        "noise"
    }

    async fn page_count(&self, doc: &PdfDocument, _scratch: &ScratchDir) -> BackendResult<u32> {
        split::count_pages(doc.bytes())
    }

    async fn extract_page(
        &self,
        _doc: &PdfDocument,
        _scratch: &ScratchDir,
        _page: u32,
    ) -> BackendResult<Vec<u8>> {
        Err(BackendError::Unsupported {
            engine: "noise",
            operation: "page extraction",
        })
    }

    async fn rasterize(
        &self,
        doc: &PdfDocument,
        scratch: &ScratchDir,
        pages: &[u32],
        options: &RasterOptions,
    ) -> BackendResult<Vec<RenderedPage>> {
        assert!(scratch.path().is_dir());
        let sizes = page_sizes(doc.bytes());

        pages
            .iter()
            .map(|&page| {
                let (w, h) = sizes[page as usize - 1];
                let scale = options.scale();
                let image = noise_image((w * scale).round() as u32, (h * scale).round() as u32);
                Ok(RenderedPage {
                    page,
                    data: encode_image(&image, options.format, options.jpeg_quality)?,
                    format: options.format,
                })
            })
            .collect()
    }
}

/// Noise rasterizer that remembers the label of every document it renders
#[derive(Default)]
pub struct RecordingRasterizer {
    labels: Mutex<Vec<&'static str>>,
}

impl RecordingRasterizer {
    pub fn labels(&self) -> Vec<&'static str> {
        self.labels.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderBackend for RecordingRasterizer {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn page_count(&self, doc: &PdfDocument, _scratch: &ScratchDir) -> BackendResult<u32> {
        split::count_pages(doc.bytes())
    }

    async fn extract_page(
        &self,
        _doc: &PdfDocument,
        _scratch: &ScratchDir,
        _page: u32,
    ) -> BackendResult<Vec<u8>> {
        Err(BackendError::Unsupported {
            engine: "recording",
            operation: "page extraction",
        })
    }

    async fn rasterize(
        &self,
        doc: &PdfDocument,
        scratch: &ScratchDir,
        pages: &[u32],
        options: &RasterOptions,
    ) -> BackendResult<Vec<RenderedPage>> {
        self.labels.lock().unwrap().push(doc.label());
        NoiseRasterizer.rasterize(doc, scratch, pages, options).await
    }
}

/// Rasterizer whose renderer always exits with an error
pub struct BrokenRasterizer;

#[async_trait]
impl RenderBackend for BrokenRasterizer {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn page_count(&self, doc: &PdfDocument, _scratch: &ScratchDir) -> BackendResult<u32> {
        split::count_pages(doc.bytes())
    }

    async fn extract_page(
        &self,
        _doc: &PdfDocument,
        _scratch: &ScratchDir,
        _page: u32,
    ) -> BackendResult<Vec<u8>> {
        Err(BackendError::Unsupported {
            engine: "broken",
            operation: "page extraction",
        })
    }

    async fn rasterize(
        &self,
        doc: &PdfDocument,
        scratch: &ScratchDir,
        _pages: &[u32],
        _options: &RasterOptions,
    ) -> BackendResult<Vec<RenderedPage>> {
        scratch.stage(doc).await?;
        Err(BackendError::ToolFailed {
            tool: "pdftoppm".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "Syntax Error: Couldn't read xref table".to_string(),
        })
    }
}

pub fn test_config(temp_dir: &Path) -> Config {
    let mut config = Config::default();
    config.temp_dir = temp_dir.to_path_buf();
    config.render.dpi = 72;
    config
}

pub fn app_with(temp_dir: &Path, rasterizer: Arc<dyn RenderBackend>) -> Router {
    app_with_config(test_config(temp_dir), rasterizer)
}

pub fn app_with_config(config: Config, rasterizer: Arc<dyn RenderBackend>) -> Router {
    let splitter = Arc::new(LopdfBackend::new(Duration::from_secs(30)));
    create_router(AppState::with_backends(config, splitter, rasterizer))
}

pub fn app(temp_dir: &Path) -> Router {
    app_with(temp_dir, Arc::new(NoiseRasterizer))
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Number of entries left under the scratch root
pub fn leftover_entries(temp_dir: &Path) -> usize {
    std::fs::read_dir(temp_dir).unwrap().count()
}
