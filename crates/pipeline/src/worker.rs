//! Worker runtime: pulls queued jobs and drives them to a terminal status.
//!
//! A slot is acquired *before* the next id is taken from the queue, so jobs
//! start in submission order and a job waiting for a slot is still
//! `queued` (and therefore cancellable) in the table.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use wangate_core::job::{JobError, JobOutput};
use wangate_core::types::JobId;
use wangate_engine::LazyEngine;

use crate::progress::TableProgressSink;
use crate::table::JobTable;

/// Detail recorded when the engine call panics.
const ENGINE_PANIC_DETAIL: &str = "engine panicked";

#[derive(Clone)]
pub struct WorkerRuntime {
    table: Arc<JobTable>,
    engine: Arc<LazyEngine>,
    slots: Arc<Semaphore>,
    max_concurrent: usize,
}

impl WorkerRuntime {
    pub fn new(table: Arc<JobTable>, engine: Arc<LazyEngine>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            table,
            engine,
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Run until `cancel` fires or every queue sender is dropped.
    ///
    /// On shutdown no new job is started; jobs already executing are
    /// awaited. Jobs still queued stay `queued` in the table.
    pub async fn run(self, mut queue: mpsc::UnboundedReceiver<JobId>, cancel: CancellationToken) {
        tracing::info!(max_concurrent = self.max_concurrent, "Worker runtime started");
        let mut running = JoinSet::new();

        loop {
            while running.try_join_next().is_some() {}

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job_id = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = queue.recv() => match next {
                    Some(job_id) => job_id,
                    None => break,
                },
            };

            let worker = self.clone();
            running.spawn(async move {
                worker.execute(job_id).await;
                drop(permit);
            });
        }

        queue.close();
        let mut dropped = 0usize;
        while queue.try_recv().is_ok() {
            dropped += 1;
        }
        tracing::info!(
            in_flight = running.len(),
            dropped_queued = dropped,
            "Worker runtime stopping",
        );

        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Job task ended abnormally");
            }
        }
        tracing::info!("Worker runtime stopped");
    }

    /// Execute one job. Every failure is recorded on the job itself.
    pub async fn execute(&self, job_id: JobId) {
        let started_at = Utc::now();
        let params = match self.table.update(job_id.as_str(), |r| {
            r.start(started_at)
                .map(|()| r.request_parameters().clone())
        }) {
            Ok(Ok(params)) => params,
            Ok(Err(e)) => {
                tracing::debug!(job_id = %job_id, reason = %e, "Skipping job that left the queue");
                return;
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Queued job no longer in table");
                return;
            }
        };
        tracing::info!(job_id = %job_id, "Job started");

        let outcome = match self.engine.get().await {
            Ok(engine) => {
                let sink = TableProgressSink::new(Arc::clone(&self.table), job_id.clone());
                match tokio::task::spawn_blocking(move || engine.invoke(&params, &sink)).await {
                    Ok(result) => result.map_err(JobError::from),
                    Err(e) => {
                        tracing::error!(job_id = %job_id, error = %e, "Engine call aborted");
                        Err(JobError::execution(if e.is_panic() {
                            ENGINE_PANIC_DETAIL.to_string()
                        } else {
                            format!("engine call aborted: {e}")
                        }))
                    }
                }
            }
            Err(e) => Err(JobError::from(e)),
        };

        match &outcome {
            Ok(output) => tracing::info!(
                job_id = %job_id,
                output_path = %output.output_path,
                "Job completed",
            ),
            Err(err) => tracing::warn!(
                job_id = %job_id,
                kind = ?err.kind,
                detail = %err.detail,
                "Job failed",
            ),
        }

        let finished_at = Utc::now();
        let recorded = self.table.update(job_id.as_str(), |r| match outcome {
            Ok(output) => r.complete(
                JobOutput {
                    output_path: output.output_path,
                },
                finished_at,
            ),
            Err(err) => r.fail(err, finished_at),
        });
        match recorded {
            Ok(Ok(())) => {}
            Ok(Err(e)) | Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record job outcome");
            }
        }
    }
}
