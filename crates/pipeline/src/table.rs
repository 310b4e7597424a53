//! The process-wide job table.
//!
//! Every operation takes the lock once and releases it before returning,
//! so the engine call and progress callbacks never wait on each other for
//! longer than a map lookup.

use indexmap::IndexMap;
use parking_lot::RwLock;
use wangate_core::error::CoreError;
use wangate_core::job::{JobRecord, JobSnapshot, JobStatus};
use wangate_core::types::JobId;

const ENTITY: &str = "Job";

/// In-memory job store, ordered by submission.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: RwLock<IndexMap<JobId, JobRecord>>,
    /// Maximum number of terminal records kept. `None` keeps everything.
    history_limit: Option<usize>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table that evicts the oldest terminal records once more than
    /// `limit` have accumulated. Non-terminal records are never evicted.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            jobs: RwLock::default(),
            history_limit: Some(limit),
        }
    }

    pub fn insert(&self, record: JobRecord) -> Result<(), CoreError> {
        self.insert_and(record, |_| Ok(()))
    }

    /// Insert `record`, then run `then` before the write lock is released.
    ///
    /// Nothing can observe the record until `then` has succeeded. If it
    /// fails the record is removed again and its error returned.
    pub fn insert_and<R>(
        &self,
        record: JobRecord,
        then: impl FnOnce(&JobId) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let mut jobs = self.jobs.write();
        if jobs.contains_key(record.id()) {
            return Err(CoreError::Conflict(format!(
                "Job {} already exists",
                record.id()
            )));
        }
        let id = record.id().clone();
        jobs.insert(id.clone(), record);
        then(&id).inspect_err(|_| {
            jobs.shift_remove(&id);
        })
    }

    pub fn get(&self, id: &str) -> Result<JobRecord, CoreError> {
        self.jobs.read().get(id).cloned().ok_or_else(|| not_found(id))
    }

    pub fn snapshot(&self, id: &str) -> Result<JobSnapshot, CoreError> {
        self.jobs
            .read()
            .get(id)
            .map(JobRecord::snapshot)
            .ok_or_else(|| not_found(id))
    }

    /// Atomic read-modify-write of one record.
    ///
    /// If the mutation moves the record into a terminal status, the
    /// history limit is enforced under the same lock.
    pub fn update<R>(&self, id: &str, mutate: impl FnOnce(&mut JobRecord) -> R) -> Result<R, CoreError> {
        let mut jobs = self.jobs.write();
        let record = jobs.get_mut(id).ok_or_else(|| not_found(id))?;

        let was_terminal = record.status().is_terminal();
        let result = mutate(record);
        let now_terminal = record.status().is_terminal();

        if !was_terminal && now_terminal {
            if let Some(limit) = self.history_limit {
                let evicted = evict_terminal_over(&mut jobs, limit);
                if evicted > 0 {
                    tracing::debug!(evicted, limit, "Evicted old terminal jobs");
                }
            }
        }
        Ok(result)
    }

    /// Snapshots of every record, in submission order.
    pub fn list_all(&self) -> Vec<JobSnapshot> {
        self.jobs.read().values().map(JobRecord::snapshot).collect()
    }

    /// Snapshots with the given status, in submission order.
    pub fn list_by_status(&self, status: JobStatus) -> Vec<JobSnapshot> {
        self.jobs
            .read()
            .values()
            .filter(|r| r.status() == status)
            .map(JobRecord::snapshot)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

fn not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        entity: ENTITY,
        id: id.to_string(),
    }
}

/// Remove the oldest terminal records beyond `limit`, keeping order.
fn evict_terminal_over(jobs: &mut IndexMap<JobId, JobRecord>, limit: usize) -> usize {
    let terminal = jobs.values().filter(|r| r.status().is_terminal()).count();
    let mut excess = terminal.saturating_sub(limit);
    let evicted = excess;
    if excess == 0 {
        return 0;
    }
    jobs.retain(|_, record| {
        if excess > 0 && record.status().is_terminal() {
            excess -= 1;
            false
        } else {
            true
        }
    });
    evicted
}
