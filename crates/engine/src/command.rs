//! Wan2GP adapter: drives the backend through a runner subprocess.
//!
//! The runner receives the normalized parameter set as one JSON document on
//! stdin, calls the backend's generation entry point, and reports back with
//! the line protocol in [`crate::protocol`].

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use wangate_core::params::NormalizedParams;

use crate::catalog::{self, LoraEntry, ModelEntry};
use crate::config::EngineConfig;
use crate::engine::{EngineOutput, GenerationEngine, ProgressSink};
use crate::error::EngineError;
use crate::lazy::{BackendProbe, EngineFactory};
use crate::outputs::discover_output;
use crate::protocol::{parse_line, RunnerEvent};

/// Backend settings file that may relocate the output directory.
const BACKEND_CONFIG_FILE: &str = "wgp_config.json";

const DEFAULT_SAVE_PATH: &str = "outputs";

/// Number of stderr lines kept for failure diagnostics.
const STDERR_TAIL_LINES: usize = 20;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// One runner process per generation.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    save_dir: PathBuf,
}

impl CommandEngine {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        working_dir: impl Into<PathBuf>,
        save_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.into(),
            save_dir: save_dir.into(),
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }
}

impl GenerationEngine for CommandEngine {
    fn invoke(
        &self,
        params: &NormalizedParams,
        progress: &dyn ProgressSink,
    ) -> Result<EngineOutput, EngineError> {
        let payload = serde_json::to_vec(params)
            .map_err(|e| EngineError::Execution(format!("cannot encode parameters: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EngineError::Unavailable(format!("failed to start runner '{}': {e}", self.program))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A runner that exits early closes the pipe; its exit status
            // carries the real failure.
            if let Err(e) = stdin.write_all(&payload).and_then(|()| stdin.write_all(b"\n")) {
                tracing::debug!(error = %e, "Runner closed stdin early");
            }
        }

        let stderr_reader = child
            .stderr
            .take()
            .map(|stderr| std::thread::spawn(move || stderr_tail(stderr)));

        let mut reported_path = None;
        let mut runner_error = None;
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read runner output");
                        break;
                    }
                };
                match parse_line(&line) {
                    Some(RunnerEvent::Progress(Some(percent))) => progress.on_progress(percent),
                    Some(RunnerEvent::Progress(None)) => {}
                    Some(RunnerEvent::Status(message)) => {
                        tracing::debug!(%message, "Runner status");
                        progress.on_status(&message);
                    }
                    Some(RunnerEvent::Completed { output_path }) => reported_path = output_path,
                    Some(RunnerEvent::Error(message)) => {
                        runner_error = Some(EngineError::Execution(message))
                    }
                    Some(RunnerEvent::Unavailable(message)) => {
                        runner_error = Some(EngineError::Unavailable(message))
                    }
                    None => tracing::trace!(%line, "Runner output"),
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| EngineError::Execution(format!("failed to wait for runner: {e}")))?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if let Some(err) = runner_error {
            return Err(err);
        }
        if !status.success() {
            let detail = if stderr.is_empty() {
                format!("runner exited with {status}")
            } else {
                stderr
            };
            return Err(EngineError::Execution(detail));
        }

        let output_path = match reported_path {
            Some(path) => PathBuf::from(path),
            None => discover_output(&self.save_dir, params.output_filename())?,
        };
        Ok(EngineOutput {
            output_path: output_path.to_string_lossy().into_owned(),
        })
    }
}

/// Last [`STDERR_TAIL_LINES`] lines of a stream, joined.
fn stderr_tail(stream: impl Read) -> String {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    for line in BufReader::new(stream).lines().map_while(Result::ok) {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Factory for [`CommandEngine`]s bound to one Wan2GP installation.
pub struct Wan2gpFactory {
    config: EngineConfig,
}

impl Wan2gpFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn check_installation(&self) -> Result<(), EngineError> {
        let backend = &self.config.backend_path;
        if !backend.is_dir() {
            return Err(EngineError::Unavailable(format!(
                "backend directory {} does not exist",
                backend.display()
            )));
        }
        let entrypoint = self.config.entrypoint_path();
        if !entrypoint.is_file() {
            return Err(EngineError::Unavailable(format!(
                "backend entry point {} not found",
                entrypoint.display()
            )));
        }
        let script = self.config.runner_script_path();
        if !script.is_file() {
            return Err(EngineError::Unavailable(format!(
                "runner script {} not found",
                script.display()
            )));
        }
        Ok(())
    }
}

impl EngineFactory for Wan2gpFactory {
    fn identity(&self) -> String {
        self.config.backend_path.display().to_string()
    }

    fn probe(&self) -> BackendProbe {
        let checked = self.check_installation();
        let model_count = catalog::list_models(&self.config.backend_path).len();
        BackendProbe {
            identity: self.identity(),
            ready: checked.is_ok(),
            model_count,
            detail: checked.err().map(|e| e.detail().to_string()),
        }
    }

    fn create(&self) -> Result<Arc<dyn GenerationEngine>, EngineError> {
        self.check_installation()?;
        let save_dir = resolve_save_dir(&self.config.backend_path);
        let script = self.config.runner_script_path();
        tracing::info!(
            backend = %self.config.backend_path.display(),
            runner = %self.config.runner,
            script = %script.display(),
            save_dir = %save_dir.display(),
            "Wan2GP runner configured",
        );
        Ok(Arc::new(CommandEngine::new(
            self.config.runner.clone(),
            vec![script.to_string_lossy().into_owned()],
            self.config.backend_path.clone(),
            save_dir,
        )))
    }

    fn list_models(&self) -> Result<Vec<ModelEntry>, EngineError> {
        Ok(catalog::list_models(&self.config.backend_path))
    }

    fn list_loras(&self) -> Result<Vec<LoraEntry>, EngineError> {
        Ok(catalog::list_loras(&self.config.backend_path))
    }
}

/// Output directory configured in the backend's settings file, resolved
/// against the backend directory.
pub fn resolve_save_dir(backend_path: &Path) -> PathBuf {
    let configured = std::fs::read_to_string(backend_path.join(BACKEND_CONFIG_FILE))
        .ok()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .and_then(|config| {
            config
                .get("save_path")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SAVE_PATH.to_string());
    backend_path.join(configured)
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::sync::Mutex;

    use serde_json::json;
    use wangate_core::normalize::normalize;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<i64>>);

    impl ProgressSink for Recorder {
        fn on_progress(&self, percent: i64) {
            self.0.lock().unwrap().push(percent);
        }
    }

    fn params(prompt: &str) -> NormalizedParams {
        normalize(&json!({ "prompt": prompt }))
            .unwrap()
            .params
            .with_default_output_filename("gen_t1")
    }

    fn shell(dir: &Path, script: &str) -> CommandEngine {
        CommandEngine::new(
            "sh",
            vec!["-c".into(), script.into()],
            dir,
            dir.join("outputs"),
        )
    }

    // -- engine --------------------------------------------------------------

    #[test]
    fn reports_progress_and_completion() {
        let dir = tempfile::tempdir().unwrap();
        let engine = shell(
            dir.path(),
            r#"cat > /dev/null
echo '{"event":"progress","percent":10}'
echo 'loading shards...'
echo '{"event":"status","message":"denoising"}'
echo '{"event":"progress","data":[60,"step 12/20"]}'
echo '{"event":"completed","output_path":"/tmp/a.mp4"}'"#,
        );
        let recorder = Recorder::default();

        let output = engine.invoke(&params("x"), &recorder).unwrap();
        assert_eq!(output.output_path, "/tmp/a.mp4");
        assert_eq!(*recorder.0.lock().unwrap(), vec![10, 60]);
    }

    #[test]
    fn parameters_are_written_to_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let engine = shell(
            dir.path(),
            r#"grep -q '"prompt":"hello"' && echo '{"event":"completed","output_path":"ok.mp4"}'"#,
        );

        let output = engine.invoke(&params("hello"), &Recorder::default()).unwrap();
        assert_eq!(output.output_path, "ok.mp4");
    }

    #[test]
    fn error_event_message_is_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let engine = shell(
            dir.path(),
            r#"cat > /dev/null; echo '{"event":"error","message":"boom"}'; exit 1"#,
        );

        assert_eq!(
            engine.invoke(&params("x"), &Recorder::default()),
            Err(EngineError::Execution("boom".into()))
        );
    }

    #[test]
    fn unavailable_event_maps_to_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = shell(
            dir.path(),
            r#"cat > /dev/null; echo '{"event":"unavailable","message":"could not import wgp"}'; exit 3"#,
        );

        assert_eq!(
            engine.invoke(&params("x"), &Recorder::default()),
            Err(EngineError::Unavailable("could not import wgp".into()))
        );
    }

    #[test]
    fn non_zero_exit_reports_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        let engine = shell(
            dir.path(),
            "cat > /dev/null; echo 'Traceback (most recent call last):' >&2; echo 'RuntimeError: CUDA out of memory' >&2; exit 3",
        );

        let err = engine.invoke(&params("x"), &Recorder::default()).unwrap_err();
        assert!(matches!(&err, EngineError::Execution(msg) if msg.ends_with("CUDA out of memory")));
    }

    #[test]
    fn missing_runner_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CommandEngine::new(
            "/nonexistent/runner",
            Vec::new(),
            dir.path(),
            dir.path().join("outputs"),
        );

        assert!(matches!(
            engine.invoke(&params("x"), &Recorder::default()),
            Err(EngineError::Unavailable(_))
        ));
    }

    #[test]
    fn discovers_output_when_runner_reports_no_path() {
        let dir = tempfile::tempdir().unwrap();
        let engine = shell(
            dir.path(),
            r#"cat > /dev/null
mkdir -p outputs
: > outputs/2025-01-01-gen_t1.mp4
echo '{"event":"completed"}'"#,
        );

        let output = engine.invoke(&params("x"), &Recorder::default()).unwrap();
        assert!(output.output_path.ends_with("2025-01-01-gen_t1.mp4"));
    }

    #[test]
    fn success_without_output_is_an_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = shell(dir.path(), "cat > /dev/null");

        assert_eq!(
            engine.invoke(&params("x"), &Recorder::default()),
            Err(EngineError::Execution("no output file produced".into()))
        );
    }

    // -- factory -------------------------------------------------------------

    fn factory(dir: &Path) -> Wan2gpFactory {
        Wan2gpFactory::new(EngineConfig {
            backend_path: dir.to_path_buf(),
            entrypoint: "wgp.py".into(),
            runner: "sh".into(),
            runner_script: "runner.sh".into(),
        })
    }

    /// Entry point plus a runner script that reports a fixed output.
    fn install(dir: &Path) {
        fs::write(dir.join("wgp.py"), "").unwrap();
        fs::write(
            dir.join("runner.sh"),
            "cat > /dev/null\necho '{\"event\":\"completed\",\"output_path\":\"done.mp4\"}'\n",
        )
        .unwrap();
    }

    #[test]
    fn probe_reports_missing_installation() {
        let dir = tempfile::tempdir().unwrap();
        let probe = factory(&dir.path().join("nope")).probe();

        assert!(!probe.ready);
        assert_eq!(probe.model_count, 0);
        assert!(probe.detail.unwrap().contains("does not exist"));
    }

    #[test]
    fn probe_counts_models_of_a_valid_installation() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());
        fs::create_dir_all(dir.path().join("ckpts")).unwrap();
        fs::write(dir.path().join("ckpts/a.safetensors"), "").unwrap();
        fs::write(dir.path().join("ckpts/b.safetensors"), "").unwrap();

        let probe = factory(dir.path()).probe();
        assert!(probe.ready);
        assert_eq!(probe.model_count, 2);
        assert_eq!(probe.identity, dir.path().display().to_string());
    }

    #[test]
    fn create_requires_entry_point() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            factory(dir.path()).create(),
            Err(EngineError::Unavailable(msg)) if msg.contains("wgp.py")
        ));

        install(dir.path());
        assert!(factory(dir.path()).create().is_ok());
    }

    #[test]
    fn missing_runner_script_makes_backend_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("wgp.py"), "").unwrap();

        let probe = factory(dir.path()).probe();
        assert!(!probe.ready);
        assert!(probe.detail.unwrap().contains("runner script"));
        assert!(matches!(
            factory(dir.path()).create(),
            Err(EngineError::Unavailable(msg)) if msg.contains("runner.sh")
        ));
    }

    #[test]
    fn created_engine_runs_the_runner_script() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path());

        let engine = factory(dir.path()).create().unwrap();
        let output = engine.invoke(&params("x"), &Recorder::default()).unwrap();
        assert_eq!(output.output_path, "done.mp4");
    }

    #[test]
    fn save_dir_follows_backend_config() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_save_dir(dir.path()), dir.path().join("outputs"));

        fs::write(
            dir.path().join("wgp_config.json"),
            r#"{"save_path": "renders/video"}"#,
        )
        .unwrap();
        assert_eq!(resolve_save_dir(dir.path()), dir.path().join("renders/video"));

        fs::write(
            dir.path().join("wgp_config.json"),
            r#"{"save_path": "/mnt/out"}"#,
        )
        .unwrap();
        assert_eq!(resolve_save_dir(dir.path()), PathBuf::from("/mnt/out"));
    }
}
