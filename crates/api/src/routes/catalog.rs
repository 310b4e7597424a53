use axum::routing::get;
use axum::Router;

use crate::handlers::catalog;
use crate::state::AppState;

/// Catalog routes, merged into `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/models", get(catalog::list_models))
        .route("/loras", get(catalog::list_loras))
}
