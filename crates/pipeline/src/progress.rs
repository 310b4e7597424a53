//! Progress sink that writes engine ticks into the job table.

use std::sync::Arc;

use wangate_core::types::JobId;
use wangate_engine::ProgressSink;

use crate::table::JobTable;

/// Forwards progress for one job into its record.
///
/// Invalid or regressing ticks are dropped by the record itself.
pub struct TableProgressSink {
    table: Arc<JobTable>,
    job_id: JobId,
}

impl TableProgressSink {
    pub fn new(table: Arc<JobTable>, job_id: JobId) -> Self {
        Self { table, job_id }
    }
}

impl ProgressSink for TableProgressSink {
    fn on_progress(&self, percent: i64) {
        match self
            .table
            .update(self.job_id.as_str(), |r| r.record_progress(percent))
        {
            Ok(true) => {
                tracing::debug!(job_id = %self.job_id, percent, "Job progress");
            }
            Ok(false) => {
                tracing::trace!(job_id = %self.job_id, percent, "Ignored progress tick");
            }
            Err(e) => {
                tracing::error!(
                    job_id = %self.job_id,
                    error = %e,
                    "Failed to update job progress",
                );
            }
        }
    }

    fn on_status(&self, message: &str) {
        tracing::info!(job_id = %self.job_id, %message, "Engine status");
    }
}
