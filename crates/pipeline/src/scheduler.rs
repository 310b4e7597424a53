//! Job submission and cancellation.
//!
//! `submit` only normalizes, records and enqueues: it returns as soon as
//! the queued record is visible in the table, whatever the engine is doing.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use wangate_core::error::CoreError;
use wangate_core::job::{JobRecord, JobSnapshot, JobStatus};
use wangate_core::normalize::{normalize_with, Adjustment, NormalizePolicy};
use wangate_core::types::JobId;

use crate::table::JobTable;

/// Characters of the prompt shown in the submission log line.
const PROMPT_LOG_CHARS: usize = 50;

/// Prefix of the output file name assigned when the caller names none.
const OUTPUT_FILENAME_PREFIX: &str = "gen_";

/// Acceptance receipt for a submitted job.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Optional parameters that were replaced by their defaults.
    pub adjustments: Vec<Adjustment>,
}

#[derive(Clone)]
pub struct JobScheduler {
    table: Arc<JobTable>,
    queue: mpsc::UnboundedSender<JobId>,
    policy: NormalizePolicy,
}

impl JobScheduler {
    pub fn new(
        table: Arc<JobTable>,
        queue: mpsc::UnboundedSender<JobId>,
        policy: NormalizePolicy,
    ) -> Self {
        Self {
            table,
            queue,
            policy,
        }
    }

    /// Validate and queue a generation request.
    ///
    /// Validation failures are returned here and leave no record behind.
    pub fn submit(&self, raw: &Value) -> Result<Submission, CoreError> {
        let normalized = normalize_with(raw, self.policy).inspect_err(|e| {
            tracing::debug!(error = %e, "Rejected job submission");
        })?;

        if self.queue.is_closed() {
            return Err(CoreError::Internal(
                "worker runtime is not running".to_string(),
            ));
        }

        let job_id = JobId::generate();
        for adjustment in &normalized.adjustments {
            tracing::warn!(
                job_id = %job_id,
                field = adjustment.field,
                reason = %adjustment.reason,
                applied = %adjustment.applied,
                "Replaced invalid parameter with default",
            );
        }

        let params = normalized
            .params
            .with_default_output_filename(&format!("{OUTPUT_FILENAME_PREFIX}{job_id}"));
        let prompt_preview: String = params.prompt().chars().take(PROMPT_LOG_CHARS).collect();
        let model = params.get_str("model_type").unwrap_or_default().to_string();

        // Queue order must match table order, so the id is sent while the
        // table is still locked.
        self.table
            .insert_and(JobRecord::new(job_id.clone(), params, Utc::now()), |id| {
                self.queue.send(id.clone()).map_err(|_| {
                    CoreError::Internal("worker runtime is not running".to_string())
                })
            })?;

        tracing::info!(
            job_id = %job_id,
            mode = normalized.mode.name,
            model = %model,
            prompt = %prompt_preview,
            "Job submitted",
        );

        Ok(Submission {
            job_id,
            status: JobStatus::Queued,
            adjustments: normalized.adjustments,
        })
    }

    /// Cancel a job that has not started yet.
    ///
    /// Returns the resulting snapshot. A job that already left `queued` is
    /// left untouched and its current snapshot is returned.
    pub fn cancel(&self, id: &str) -> Result<JobSnapshot, CoreError> {
        let now = Utc::now();
        let (cancelled, snapshot) = self.table.update(id, |r| (r.cancel(now), r.snapshot()))?;

        if cancelled {
            tracing::info!(job_id = %id, "Job cancelled");
        } else {
            tracing::debug!(
                job_id = %id,
                status = %snapshot.status,
                "Cancel ignored, job is no longer queued",
            );
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn scheduler() -> (JobScheduler, Arc<JobTable>, mpsc::UnboundedReceiver<JobId>) {
        let table = Arc::new(JobTable::new());
        let (tx, rx) = mpsc::unbounded_channel();
        (
            JobScheduler::new(Arc::clone(&table), tx, NormalizePolicy::Lenient),
            table,
            rx,
        )
    }

    #[test]
    fn submit_inserts_queued_record_and_enqueues() {
        let (scheduler, table, mut rx) = scheduler();

        let submission = scheduler.submit(&json!({ "prompt": "a cat" })).unwrap();
        assert_eq!(submission.status, JobStatus::Queued);
        assert!(submission.adjustments.is_empty());

        let record = table.get(submission.job_id.as_str()).unwrap();
        assert_eq!(record.status(), JobStatus::Queued);
        assert_eq!(record.progress(), 0);
        assert_eq!(rx.try_recv().unwrap(), submission.job_id);
    }

    #[test]
    fn output_filename_defaults_to_job_id() {
        let (scheduler, table, _rx) = scheduler();

        let submission = scheduler.submit(&json!({ "prompt": "x" })).unwrap();
        let record = table.get(submission.job_id.as_str()).unwrap();
        assert_eq!(
            record.request_parameters().output_filename(),
            format!("gen_{}", submission.job_id)
        );
    }

    #[test]
    fn invalid_request_leaves_no_record() {
        let (scheduler, table, mut rx) = scheduler();

        assert_matches!(
            scheduler.submit(&json!({ "resolution": "720x480" })),
            Err(CoreError::Validation { field, .. }) if field == "prompt"
        );
        assert!(table.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn adjustments_are_reported() {
        let (scheduler, _table, _rx) = scheduler();

        let submission = scheduler
            .submit(&json!({ "prompt": "x", "resolution": "big" }))
            .unwrap();
        assert_eq!(submission.adjustments.len(), 1);
        assert_eq!(submission.adjustments[0].field, "resolution");
    }

    #[test]
    fn strict_policy_rejects_adjustments() {
        let table = Arc::new(JobTable::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let scheduler = JobScheduler::new(Arc::clone(&table), tx, NormalizePolicy::Strict);

        assert_matches!(
            scheduler.submit(&json!({ "prompt": "x", "resolution": "big" })),
            Err(CoreError::Validation { field, .. }) if field == "resolution"
        );
        assert!(table.is_empty());
    }

    #[test]
    fn submit_fails_when_worker_is_gone() {
        let (scheduler, table, rx) = scheduler();
        drop(rx);

        assert_matches!(
            scheduler.submit(&json!({ "prompt": "x" })),
            Err(CoreError::Internal(_))
        );
        assert!(table.is_empty());
    }

    #[test]
    fn ids_are_distinct_and_listed_in_order() {
        let (scheduler, table, _rx) = scheduler();

        let ids: Vec<_> = (0..10)
            .map(|i| {
                scheduler
                    .submit(&json!({ "prompt": format!("job {i}") }))
                    .unwrap()
                    .job_id
            })
            .collect();
        let listed: Vec<_> = table.list_all().into_iter().map(|s| s.job_id).collect();
        assert_eq!(listed, ids);

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn concurrent_submits_queue_in_table_order() {
        let (scheduler, table, mut rx) = scheduler();

        std::thread::scope(|scope| {
            for t in 0..8 {
                let scheduler = &scheduler;
                scope.spawn(move || {
                    for i in 0..25 {
                        scheduler
                            .submit(&json!({ "prompt": format!("thread {t} job {i}") }))
                            .unwrap();
                    }
                });
            }
        });

        let mut queued = Vec::new();
        while let Ok(id) = rx.try_recv() {
            queued.push(id);
        }
        let listed: Vec<_> = table.list_all().into_iter().map(|s| s.job_id).collect();
        assert_eq!(queued.len(), 200);
        assert_eq!(queued, listed);
    }

    // -- cancel --

    #[test]
    fn cancel_queued_job() {
        let (scheduler, _table, _rx) = scheduler();
        let id = scheduler.submit(&json!({ "prompt": "x" })).unwrap().job_id;

        let snapshot = scheduler.cancel(id.as_str()).unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);
        assert!(snapshot.completed_at.is_some());
    }

    #[test]
    fn cancel_processing_job_is_a_no_op() {
        let (scheduler, table, _rx) = scheduler();
        let id = scheduler.submit(&json!({ "prompt": "x" })).unwrap().job_id;
        table
            .update(id.as_str(), |r| r.start(Utc::now()))
            .unwrap()
            .unwrap();

        let snapshot = scheduler.cancel(id.as_str()).unwrap();
        assert_eq!(snapshot.status, JobStatus::Processing);
        assert!(snapshot.completed_at.is_none());
    }

    #[test]
    fn cancel_unknown_job_is_not_found() {
        let (scheduler, _table, _rx) = scheduler();
        assert_matches!(
            scheduler.cancel("does-not-exist"),
            Err(CoreError::NotFound { .. })
        );
    }
}
