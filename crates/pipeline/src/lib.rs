//! Asynchronous job orchestration for the generation backend.
//!
//! [`Orchestrator::start`] wires the pieces together: one shared
//! [`JobTable`], a [`JobScheduler`] feeding a [`WorkerRuntime`] through an
//! unbounded queue, and a [`StatusQuery`] over the same table. The engine
//! is wrapped in a [`LazyEngine`] and loaded by the first job that runs.

pub mod config;
pub mod progress;
pub mod query;
pub mod scheduler;
pub mod table;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wangate_engine::{EngineFactory, LazyEngine};

pub use config::PipelineConfig;
pub use query::{HealthReport, StatusQuery};
pub use scheduler::{JobScheduler, Submission};
pub use table::JobTable;
pub use worker::WorkerRuntime;

/// Owns the running job pipeline.
pub struct Orchestrator {
    table: Arc<JobTable>,
    scheduler: JobScheduler,
    query: StatusQuery,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Build the pipeline and spawn the worker runtime.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: &PipelineConfig, factory: Arc<dyn EngineFactory>) -> Self {
        let table = Arc::new(match config.job_history_limit {
            Some(limit) => JobTable::with_history_limit(limit),
            None => JobTable::new(),
        });
        let engine = Arc::new(LazyEngine::new(factory));
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let runtime = WorkerRuntime::new(
            Arc::clone(&table),
            Arc::clone(&engine),
            config.max_concurrent_jobs,
        );
        let worker = tokio::spawn(runtime.run(rx, cancel.clone()));

        tracing::info!(
            max_concurrent_jobs = config.max_concurrent_jobs,
            history_limit = ?config.job_history_limit,
            strict_params = config.strict_params,
            "Job pipeline started",
        );

        Self {
            scheduler: JobScheduler::new(Arc::clone(&table), tx, config.normalize_policy()),
            query: StatusQuery::new(Arc::clone(&table), engine),
            table,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn query(&self) -> &StatusQuery {
        &self.query
    }

    pub fn table(&self) -> &Arc<JobTable> {
        &self.table
    }

    /// Stop starting new jobs and wait up to `timeout` for running ones.
    pub async fn shutdown(&self, timeout: Duration) {
        self.cancel.cancel();
        let handle = self.worker.lock().take();
        let Some(handle) = handle else {
            return;
        };
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => tracing::info!("Job pipeline shut down"),
            Ok(Err(e)) => tracing::error!(error = %e, "Worker runtime task failed"),
            Err(_) => tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Timed out waiting for running jobs",
            ),
        }
    }
}
