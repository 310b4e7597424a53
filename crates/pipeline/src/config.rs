use wangate_core::normalize::NormalizePolicy;

/// Orchestration settings loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Jobs executed concurrently (default: `1`, minimum `1`).
    pub max_concurrent_jobs: usize,
    /// Terminal records kept in the table; `None` keeps all of them.
    pub job_history_limit: Option<usize>,
    /// Reject invalid optional parameters instead of replacing them.
    pub strict_params: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            job_history_limit: None,
            strict_params: false,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default            |
    /// |-----------------------|--------------------|
    /// | `MAX_CONCURRENT_JOBS` | `1`                |
    /// | `JOB_HISTORY_LIMIT`   | `0` (keep all)     |
    /// | `STRICT_PARAMS`       | `false`            |
    pub fn from_env() -> Self {
        let max_concurrent_jobs: usize = std::env::var("MAX_CONCURRENT_JOBS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("MAX_CONCURRENT_JOBS must be a valid usize");

        let job_history_limit: usize = std::env::var("JOB_HISTORY_LIMIT")
            .unwrap_or_else(|_| "0".into())
            .parse()
            .expect("JOB_HISTORY_LIMIT must be a valid usize");

        let strict_params: bool = std::env::var("STRICT_PARAMS")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("STRICT_PARAMS must be true or false");

        Self {
            max_concurrent_jobs: max_concurrent_jobs.max(1),
            job_history_limit: (job_history_limit > 0).then_some(job_history_limit),
            strict_params,
        }
    }

    pub fn normalize_policy(&self) -> NormalizePolicy {
        if self.strict_params {
            NormalizePolicy::Strict
        } else {
            NormalizePolicy::Lenient
        }
    }
}
