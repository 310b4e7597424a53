//! The engine contract.

use serde::{Deserialize, Serialize};
use wangate_core::params::NormalizedParams;

use crate::error::EngineError;

/// Reference to the artifact a successful generation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub output_path: String,
}

/// Receives progress notifications during a generation call.
///
/// Called from the engine's execution context, so implementations must be
/// cheap and must not block on the caller.
pub trait ProgressSink: Send + Sync {
    /// A progress tick. Values outside `0..=100` are the sink's problem.
    fn on_progress(&self, percent: i64);

    /// Free-form status text from the backend.
    fn on_status(&self, _message: &str) {}
}

/// A loaded generation backend.
///
/// `invoke` blocks for the whole generation and is called exactly once per
/// job, from a blocking-capable thread.
pub trait GenerationEngine: Send + Sync {
    fn invoke(
        &self,
        params: &NormalizedParams,
        progress: &dyn ProgressSink,
    ) -> Result<EngineOutput, EngineError>;
}

/// Sink that drops every notification.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _percent: i64) {}
}
