//! Liveness and service description endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    pub health: &'static str,
    pub split_pdf: &'static str,
    pub convert_to_images: &'static str,
}

#[derive(Serialize)]
pub struct Engines {
    pub split: &'static str,
    pub raster: &'static str,
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: Endpoints,
    pub engines: Engines,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn index(State(state): State<AppState>) -> Json<IndexResponse> {
    let service = state.service();
    Json(IndexResponse {
        message: "PDF page server",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: Endpoints {
            health: "GET /health",
            split_pdf: "POST /api/split-pdf",
            convert_to_images: "POST /api/convert-to-images",
        },
        engines: Engines {
            split: service.splitter_name(),
            raster: service.rasterizer_name(),
        },
    })
}
