//! Job lifecycle model.
//!
//! A [`JobRecord`] owns its state machine: every transition goes through a
//! method that checks the current status, so `result` and `error` can never
//! be set together and timestamps are written exactly once.
//!
//! ```text
//! queued -> processing -> completed
//!                      \-> failed
//! queued -> cancelled
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::params::NormalizedParams;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Job execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// All statuses, in lifecycle order.
pub const ALL_STATUSES: &[JobStatus] = &[
    JobStatus::Queued,
    JobStatus::Processing,
    JobStatus::Completed,
    JobStatus::Failed,
    JobStatus::Cancelled,
];

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// No further transitions occur from a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Cancelled)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_STATUSES
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                CoreError::validation(
                    "status",
                    format!(
                        "Unknown job status '{s}'. Must be one of: {}",
                        ALL_STATUSES
                            .iter()
                            .map(|st| st.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                )
            })
    }
}

// ---------------------------------------------------------------------------
// Outcome payloads
// ---------------------------------------------------------------------------

/// Output artifact reference recorded on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    pub output_path: String,
}

/// Classification of a post-submission failure.
///
/// Serialized with the exact kind names pollers match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobErrorKind {
    /// The backend could not be reached or initialized.
    EngineUnavailableError,
    /// The generation call itself failed.
    EngineExecutionError,
}

/// Structured error attached to a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: JobErrorKind,
    /// Diagnostic text from the engine, verbatim.
    pub detail: String,
}

impl JobError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::EngineUnavailableError,
            detail: detail.into(),
        }
    }

    pub fn execution(detail: impl Into<String>) -> Self {
        Self {
            kind: JobErrorKind::EngineExecutionError,
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The single source of truth for one job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    id: JobId,
    status: JobStatus,
    progress: u8,
    created_at: Timestamp,
    started_at: Option<Timestamp>,
    completed_at: Option<Timestamp>,
    request_parameters: NormalizedParams,
    result: Option<JobOutput>,
    error: Option<JobError>,
}

impl JobRecord {
    /// Create a `queued` record.
    pub fn new(id: JobId, request_parameters: NormalizedParams, created_at: Timestamp) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0,
            created_at,
            started_at: None,
            completed_at: None,
            request_parameters,
            result: None,
            error: None,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    pub fn request_parameters(&self) -> &NormalizedParams {
        &self.request_parameters
    }

    pub fn result(&self) -> Option<&JobOutput> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "Job {} cannot move from {} to {next}",
                self.id, self.status
            )));
        }
        self.status = next;
        Ok(())
    }

    /// `queued -> processing`.
    pub fn start(&mut self, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Processing)?;
        self.started_at = Some(now);
        self.progress = 0;
        Ok(())
    }

    /// Record a progress tick.
    ///
    /// Returns `true` when the stored value changed. Ticks outside
    /// `0..=100`, ticks lower than the current value, and ticks for a job
    /// that is not processing are ignored.
    pub fn record_progress(&mut self, percent: i64) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        let Ok(percent) = u8::try_from(percent) else {
            return false;
        };
        if percent > 100 || percent <= self.progress {
            return false;
        }
        self.progress = percent;
        true
    }

    /// `processing -> completed`. Progress is frozen at 100.
    pub fn complete(&mut self, output: JobOutput, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Completed)?;
        self.progress = 100;
        self.result = Some(output);
        self.completed_at = Some(now);
        Ok(())
    }

    /// `processing -> failed`. Progress is frozen at its last value.
    pub fn fail(&mut self, error: JobError, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error);
        self.completed_at = Some(now);
        Ok(())
    }

    /// `queued -> cancelled`.
    ///
    /// Returns `false` (leaving the record untouched) when the job has
    /// already left `queued`.
    pub fn cancel(&mut self, now: Timestamp) -> bool {
        if self.transition(JobStatus::Cancelled).is_err() {
            return false;
        }
        self.completed_at = Some(now);
        true
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot::from(self)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only view of a job served to pollers.
///
/// A failed job has the same shape as a completed one, with `error`
/// populated instead of `result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl From<&JobRecord> for JobSnapshot {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.id.clone(),
            status: record.status,
            progress: record.progress,
            result: record.result.clone(),
            error: record.error.clone(),
            created_at: record.created_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
