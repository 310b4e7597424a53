use std::sync::Arc;

use wangate_pipeline::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job pipeline (scheduler, worker runtime, status queries).
    pub pipeline: Arc<Orchestrator>,
}
