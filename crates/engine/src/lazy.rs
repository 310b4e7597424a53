//! Initialize-once engine handle.
//!
//! The backend is expensive to load, so nothing touches it until the first
//! job needs it. Concurrent first uses race on a [`OnceCell`]; exactly one
//! of them runs [`EngineFactory::create`]. A failed initialization leaves
//! the cell empty and the next job tries again.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::catalog::{LoraEntry, ModelEntry};
use crate::engine::GenerationEngine;
use crate::error::EngineError;

/// Cheap readiness report. Producing one never loads the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendProbe {
    /// Where the backend lives (a path, or a stub name in tests).
    pub identity: String,
    pub ready: bool,
    pub model_count: usize,
    /// Why the backend is not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Builds engines and answers questions about the backend installation.
pub trait EngineFactory: Send + Sync + 'static {
    fn identity(&self) -> String;

    /// Check the installation without loading anything heavy.
    fn probe(&self) -> BackendProbe;

    /// Load the engine. Blocking; runs on a blocking thread.
    fn create(&self) -> Result<Arc<dyn GenerationEngine>, EngineError>;

    fn list_models(&self) -> Result<Vec<ModelEntry>, EngineError> {
        Ok(Vec::new())
    }

    fn list_loras(&self) -> Result<Vec<LoraEntry>, EngineError> {
        Ok(Vec::new())
    }
}

/// Lazily initialized, shared engine singleton.
pub struct LazyEngine {
    factory: Arc<dyn EngineFactory>,
    engine: OnceCell<Arc<dyn GenerationEngine>>,
}

impl LazyEngine {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            engine: OnceCell::new(),
        }
    }

    pub fn factory(&self) -> &Arc<dyn EngineFactory> {
        &self.factory
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.initialized()
    }

    /// Return the engine, building it on first use.
    pub async fn get(&self) -> Result<Arc<dyn GenerationEngine>, EngineError> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                let factory = Arc::clone(&self.factory);
                let identity = factory.identity();
                tracing::info!(backend = %identity, "Initializing generation engine");

                let created = tokio::task::spawn_blocking(move || factory.create())
                    .await
                    .map_err(|e| {
                        EngineError::Unavailable(format!("engine initialization panicked: {e}"))
                    })
                    .and_then(|res| res);

                match &created {
                    Ok(_) => tracing::info!(backend = %identity, "Generation engine ready"),
                    Err(e) => tracing::warn!(
                        backend = %identity,
                        error = %e,
                        "Generation engine initialization failed",
                    ),
                }
                created
            })
            .await?;
        Ok(Arc::clone(engine))
    }
}
