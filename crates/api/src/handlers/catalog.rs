//! Model and LoRA catalog handlers. Pass-through of the backend's listing.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use wangate_engine::catalog::{LoraEntry, ModelEntry};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub models: Vec<ModelEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct LoraList {
    pub loras: Vec<LoraEntry>,
    pub count: usize,
}

/// GET /api/v1/models
pub async fn list_models(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<ModelList>>> {
    let models = state.pipeline.query().list_models().await?;
    Ok(Json(DataResponse {
        data: ModelList {
            count: models.len(),
            models,
        },
    }))
}

/// GET /api/v1/loras
pub async fn list_loras(State(state): State<AppState>) -> AppResult<Json<DataResponse<LoraList>>> {
    let loras = state.pipeline.query().list_loras().await?;
    Ok(Json(DataResponse {
        data: LoraList {
            count: loras.len(),
            loras,
        },
    }))
}
