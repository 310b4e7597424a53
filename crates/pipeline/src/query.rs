//! Read side: job status, listings, backend health and catalog.
//!
//! Nothing here initializes the engine.

use std::sync::Arc;

use serde::Serialize;
use wangate_core::error::CoreError;
use wangate_core::job::{JobSnapshot, JobStatus};
use wangate_core::params::PARAM_TABLE_VERSION;
use wangate_engine::catalog::{LoraEntry, ModelEntry};
use wangate_engine::{BackendProbe, EngineError, EngineFactory, LazyEngine};

use crate::table::JobTable;

/// Backend readiness, as reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    /// Backend location.
    pub backend: String,
    pub engine_ready: bool,
    /// Whether the engine has been loaded by a job yet.
    pub engine_initialized: bool,
    pub model_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub param_table_version: &'static str,
}

#[derive(Clone)]
pub struct StatusQuery {
    table: Arc<JobTable>,
    engine: Arc<LazyEngine>,
}

impl StatusQuery {
    pub fn new(table: Arc<JobTable>, engine: Arc<LazyEngine>) -> Self {
        Self { table, engine }
    }

    pub fn get_status(&self, id: &str) -> Result<JobSnapshot, CoreError> {
        self.table.snapshot(id)
    }

    /// All jobs in submission order, optionally restricted to one status.
    pub fn list_jobs(&self, status: Option<JobStatus>) -> Vec<JobSnapshot> {
        match status {
            Some(status) => self.table.list_by_status(status),
            None => self.table.list_all(),
        }
    }

    /// Probe the backend installation without loading the engine.
    pub async fn health(&self) -> HealthReport {
        let probe = self
            .on_factory(|factory| Ok(factory.probe()))
            .await
            .unwrap_or_else(|e| BackendProbe {
                identity: self.engine.factory().identity(),
                ready: false,
                model_count: 0,
                detail: Some(e.detail().to_string()),
            });

        HealthReport {
            healthy: probe.ready,
            backend: probe.identity,
            engine_ready: probe.ready,
            engine_initialized: self.engine.is_initialized(),
            model_count: probe.model_count,
            detail: probe.detail,
            param_table_version: PARAM_TABLE_VERSION,
        }
    }

    pub async fn list_models(&self) -> Result<Vec<ModelEntry>, EngineError> {
        self.on_factory(|factory| factory.list_models()).await
    }

    pub async fn list_loras(&self) -> Result<Vec<LoraEntry>, EngineError> {
        self.on_factory(|factory| factory.list_loras()).await
    }

    /// Run a blocking factory call (directory scans) off the async threads.
    async fn on_factory<T, F>(&self, call: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EngineFactory) -> Result<T, EngineError> + Send + 'static,
    {
        let factory = Arc::clone(self.engine.factory());
        tokio::task::spawn_blocking(move || call(factory.as_ref()))
            .await
            .map_err(|e| EngineError::Unavailable(format!("backend query aborted: {e}")))?
    }
}
