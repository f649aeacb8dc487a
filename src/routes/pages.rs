//! Page splitting and rendering endpoints
//!
//! - `POST /api/split-pdf`: single-page PDFs, all pages or one
//! - `POST /api/convert-to-images`: one raster image per page

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::pdf::RasterOptions;
use crate::service::{ConvertOptions, SplitOutcome};
use crate::state::AppState;
use crate::validation::{
    max_size_bytes, require_pdf, resolve_dpi, resolve_format, PageList, PageParam,
};

// Everything but the body shape is checked after deserialization, so a
// missing `pdf` is reported before a mistyped option.

#[derive(Debug, Deserialize)]
pub struct SplitPdfRequest {
    /// Base64 PDF, optionally as a data URL. Non-strings count as missing.
    pub pdf: Option<Value>,
    pub page: Option<PageParam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    pub pdf: Option<Value>,
    pub pages: Option<PageList>,
    /// Per-image size cap in megabytes
    pub max_size: Option<Value>,
    pub dpi: Option<Value>,
    pub format: Option<Value>,
}

#[derive(Serialize)]
pub struct PageEntry {
    pub page: u32,
    pub base64: String,
}

#[derive(Serialize)]
pub struct SplitAllResponse {
    pub count: usize,
    pub pages: Vec<PageEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPageResponse {
    pub page: u32,
    pub total_pages: u32,
    pub base64: String,
}

#[derive(Serialize)]
pub struct ImageEntry {
    pub page: u32,
    pub base64: String,
    /// Encoded size in MB with two decimals
    pub size_mb: String,
}

#[derive(Serialize)]
pub struct ConvertResponse {
    pub count: usize,
    pub images: Vec<ImageEntry>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/split-pdf", post(split_pdf))
        .route("/convert-to-images", post(convert_to_images))
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload.map(|Json(request)| request).map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::validation(rejection.body_text())
        }
    })
}

async fn split_pdf(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SplitPdfRequest>, JsonRejection>,
) -> Result<Response> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("split_pdf", %request_id);

    async move {
        let request = body(payload)?;
        let doc = require_pdf(request.pdf.as_ref().and_then(Value::as_str))?;

        let outcome = state
            .service()
            .split(request_id, doc, request.page.as_ref())
            .await?;

        let response = match outcome {
            SplitOutcome::Single { page, total, data } => {
                tracing::info!("Extracted page {} of {}", page, total);
                Json(SplitPageResponse {
                    page,
                    total_pages: total,
                    base64: BASE64.encode(data),
                })
                .into_response()
            }
            SplitOutcome::All(pages) => {
                tracing::info!("Split PDF into {} pages", pages.len());
                let pages: Vec<PageEntry> = pages
                    .into_iter()
                    .map(|p| PageEntry {
                        page: p.page,
                        base64: BASE64.encode(p.data),
                    })
                    .collect();
                Json(SplitAllResponse {
                    count: pages.len(),
                    pages,
                })
                .into_response()
            }
        };
        Ok(response)
    }
    .instrument(span)
    .await
}

async fn convert_to_images(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("convert_to_images", %request_id);

    async move {
        let request = body(payload)?;
        let doc = require_pdf(request.pdf.as_ref().and_then(Value::as_str))?;

        let render = &state.config().render;
        let options = ConvertOptions {
            pages: request.pages,
            max_bytes: max_size_bytes(request.max_size.as_ref(), render.default_max_image_mb)?,
            raster: RasterOptions {
                dpi: resolve_dpi(request.dpi.as_ref(), render.dpi)?,
                format: resolve_format(request.format.as_ref(), render.format)?,
                jpeg_quality: render.jpeg_quality,
            },
        };

        let rendered = state.service().convert(request_id, doc, options).await?;
        tracing::info!("Rendered {} pages", rendered.len());

        let images: Vec<ImageEntry> = rendered
            .into_iter()
            .map(|p| ImageEntry {
                page: p.page,
                size_mb: format!("{:.2}", p.size_mb()),
                base64: BASE64.encode(&p.data),
            })
            .collect();

        Ok(Json(ConvertResponse {
            count: images.len(),
            images,
        }))
    }
    .instrument(span)
    .await
}
