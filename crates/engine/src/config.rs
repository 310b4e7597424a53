use std::path::PathBuf;

/// Runner bridge shipped with this crate.
const BUNDLED_RUNNER_SCRIPT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/runner/wgp_runner.py");

/// Location of the Wan2GP installation and how to drive it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backend installation directory.
    pub backend_path: PathBuf,
    /// File whose presence marks a usable installation, relative to
    /// `backend_path`.
    pub entrypoint: String,
    /// Interpreter that hosts the backend.
    pub runner: String,
    /// Bridge script run by `runner`. Relative paths resolve against
    /// `backend_path`.
    pub runner_script: PathBuf,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                 |
    /// |------------------------|-----------------------------------------|
    /// | `WAN2GP_PATH`          | `/data/StabilityMatrix/Packages/Wan2GP` |
    /// | `WAN2GP_ENTRYPOINT`    | `wgp.py`                                |
    /// | `WAN2GP_RUNNER`        | `python3`                               |
    /// | `WAN2GP_RUNNER_SCRIPT` | bundled `runner/wgp_runner.py`          |
    pub fn from_env() -> Self {
        let backend_path = std::env::var("WAN2GP_PATH")
            .unwrap_or_else(|_| "/data/StabilityMatrix/Packages/Wan2GP".into())
            .into();

        let entrypoint = std::env::var("WAN2GP_ENTRYPOINT").unwrap_or_else(|_| "wgp.py".into());

        let runner = std::env::var("WAN2GP_RUNNER").unwrap_or_else(|_| "python3".into());

        let runner_script = std::env::var("WAN2GP_RUNNER_SCRIPT")
            .unwrap_or_else(|_| BUNDLED_RUNNER_SCRIPT.into())
            .into();

        Self {
            backend_path,
            entrypoint,
            runner,
            runner_script,
        }
    }

    pub fn entrypoint_path(&self) -> PathBuf {
        self.backend_path.join(&self.entrypoint)
    }

    pub fn runner_script_path(&self) -> PathBuf {
        self.backend_path.join(&self.runner_script)
    }
}
