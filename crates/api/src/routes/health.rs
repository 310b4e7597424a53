use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use wangate_pipeline::HealthReport;

use crate::response::DataResponse;
use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    #[serde(flatten)]
    pub report: HealthReport,
}

/// Service index payload.
#[derive(Serialize)]
pub struct IndexResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: &'static [&'static str],
}

const ENDPOINTS: &[&str] = &[
    "GET /health",
    "POST /api/v1/jobs",
    "GET /api/v1/jobs",
    "GET /api/v1/jobs/{id}",
    "POST /api/v1/jobs/{id}/cancel",
    "GET /api/v1/models",
    "GET /api/v1/loras",
];

/// GET /health -- backend readiness. Never loads the engine.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.pipeline.query().health().await;
    let (code, status) = if report.healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        code,
        Json(DataResponse {
            data: HealthResponse {
                status,
                version: env!("CARGO_PKG_VERSION"),
                report,
            },
        }),
    )
}

/// GET / -- service name and endpoint list.
async fn index() -> Json<DataResponse<IndexResponse>> {
    Json(DataResponse {
        data: IndexResponse {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            endpoints: ENDPOINTS,
        },
    })
}

/// Mount health and index routes (root level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
}
