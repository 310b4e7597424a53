use wangate_core::job::JobError;

/// Failure raised at the engine boundary.
///
/// The message is kept verbatim; it becomes the `detail` of the failed
/// job's error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The backend is missing or could not be initialized.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The generation call itself failed.
    #[error("engine execution failed: {0}")]
    Execution(String),
}

impl EngineError {
    pub fn detail(&self) -> &str {
        match self {
            EngineError::Unavailable(msg) | EngineError::Execution(msg) => msg,
        }
    }
}

impl From<EngineError> for JobError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => JobError::unavailable(msg),
            EngineError::Execution(msg) => JobError::execution(msg),
        }
    }
}
