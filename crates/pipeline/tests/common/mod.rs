//! Stub engines and helpers shared by the pipeline integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use wangate_core::job::{JobSnapshot, JobStatus};
use wangate_core::params::NormalizedParams;
use wangate_engine::{
    BackendProbe, EngineError, EngineFactory, EngineOutput, GenerationEngine, ProgressSink,
};
use wangate_pipeline::{Orchestrator, PipelineConfig};

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// A latch the engine blocks on until the test opens it.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
    }
}

// ---------------------------------------------------------------------------
// Stub engine
// ---------------------------------------------------------------------------

/// Configurable engine: records each invocation's prompt, emits `ticks`,
/// optionally waits on a gate, then returns `outcome`.
pub struct StubEngine {
    pub invoked: Mutex<Vec<String>>,
    pub running: AtomicUsize,
    pub peak_running: AtomicUsize,
    ticks: Vec<i64>,
    tick_delay: Duration,
    gate: Option<Arc<Gate>>,
    outcome: Result<EngineOutput, EngineError>,
    panics: bool,
}

impl StubEngine {
    pub fn succeeding(output_path: &str) -> Self {
        Self {
            invoked: Mutex::default(),
            running: AtomicUsize::new(0),
            peak_running: AtomicUsize::new(0),
            ticks: Vec::new(),
            tick_delay: Duration::ZERO,
            gate: None,
            outcome: Ok(EngineOutput {
                output_path: output_path.to_string(),
            }),
            panics: false,
        }
    }

    pub fn failing(err: EngineError) -> Self {
        Self {
            outcome: Err(err),
            ..Self::succeeding("")
        }
    }

    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::succeeding("")
        }
    }

    pub fn with_ticks(mut self, ticks: &[i64], delay: Duration) -> Self {
        self.ticks = ticks.to_vec();
        self.tick_delay = delay;
        self
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn invocations(&self) -> Vec<String> {
        self.invoked.lock().unwrap().clone()
    }
}

impl GenerationEngine for StubEngine {
    fn invoke(
        &self,
        params: &NormalizedParams,
        progress: &dyn ProgressSink,
    ) -> Result<EngineOutput, EngineError> {
        self.invoked.lock().unwrap().push(params.prompt().to_string());
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(now_running, Ordering::SeqCst);

        for tick in &self.ticks {
            progress.on_progress(*tick);
            std::thread::sleep(self.tick_delay);
        }
        if let Some(gate) = &self.gate {
            gate.wait();
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        if self.panics {
            panic!("stub engine exploded");
        }
        self.outcome.clone()
    }
}

// ---------------------------------------------------------------------------
// Stub factory
// ---------------------------------------------------------------------------

pub struct StubFactory {
    pub engine: Arc<StubEngine>,
    pub creates: AtomicUsize,
    failures_left: AtomicUsize,
}

impl StubFactory {
    pub fn new(engine: StubEngine) -> Arc<Self> {
        Arc::new(Self {
            engine: Arc::new(engine),
            creates: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
        })
    }

    /// A factory whose first `n` create calls fail.
    pub fn failing_first(engine: StubEngine, n: usize) -> Arc<Self> {
        let factory = Self::new(engine);
        factory.failures_left.store(n, Ordering::SeqCst);
        factory
    }
}

impl EngineFactory for StubFactory {
    fn identity(&self) -> String {
        "stub".to_string()
    }

    fn probe(&self) -> BackendProbe {
        BackendProbe {
            identity: self.identity(),
            ready: true,
            model_count: 3,
            detail: None,
        }
    }

    fn create(&self) -> Result<Arc<dyn GenerationEngine>, EngineError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngineError::Unavailable("backend not installed".into()));
        }
        Ok(self.engine.clone())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn start(factory: Arc<StubFactory>, max_concurrent_jobs: usize) -> Orchestrator {
    let config = PipelineConfig {
        max_concurrent_jobs,
        ..PipelineConfig::default()
    };
    Orchestrator::start(&config, factory)
}

/// Poll until the job's snapshot satisfies `done`, or panic after 5s.
pub async fn wait_for(
    orchestrator: &Orchestrator,
    job_id: &str,
    done: impl Fn(&JobSnapshot) -> bool,
) -> JobSnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = orchestrator.query().get_status(job_id).unwrap();
        if done(&snapshot) {
            return snapshot;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {job_id} stuck in {:?}",
            snapshot.status
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_for_status(
    orchestrator: &Orchestrator,
    job_id: &str,
    status: JobStatus,
) -> JobSnapshot {
    wait_for(orchestrator, job_id, |s| s.status == status).await
}

pub async fn wait_terminal(orchestrator: &Orchestrator, job_id: &str) -> JobSnapshot {
    wait_for(orchestrator, job_id, |s| s.status.is_terminal()).await
}
