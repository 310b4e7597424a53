pub mod catalog;
pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                   submit (POST), list (GET, ?status=)
/// /jobs/{id}              status snapshot
/// /jobs/{id}/cancel       cancel a queued job (POST)
///
/// /models                 model catalog
/// /loras                  LoRA catalog
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .merge(catalog::router())
}
