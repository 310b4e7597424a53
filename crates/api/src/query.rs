//! Query parameter types for API handlers.

use serde::Deserialize;

/// `GET /jobs?status=` filter. The value is one of the job status names.
#[derive(Debug, Default, Deserialize)]
pub struct JobListParams {
    pub status: Option<String>,
}
