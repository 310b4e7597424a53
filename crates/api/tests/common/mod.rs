#![allow(dead_code)]

use std::sync::{Arc, Condvar, Mutex};

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use wangate_core::params::NormalizedParams;
use wangate_engine::{
    BackendProbe, EngineError, EngineFactory, EngineOutput, GenerationEngine, ProgressSink,
};
use wangate_pipeline::{Orchestrator, PipelineConfig};

use wangate_api::config::ServerConfig;
use wangate_api::router::build_app_router;
use wangate_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

/// Build the full application router around `factory`.
///
/// Returns the pipeline too so tests can wait on jobs directly.
pub fn build_test_app(factory: Arc<dyn EngineFactory>) -> (Router, Arc<Orchestrator>) {
    build_test_app_with(factory, PipelineConfig::default())
}

pub fn build_test_app_with(
    factory: Arc<dyn EngineFactory>,
    pipeline_config: PipelineConfig,
) -> (Router, Arc<Orchestrator>) {
    let config = test_config();
    let pipeline = Arc::new(Orchestrator::start(&pipeline_config, factory));
    let state = AppState {
        config: Arc::new(config.clone()),
        pipeline: Arc::clone(&pipeline),
    };
    (build_app_router(state, &config), pipeline)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_raw(
    app: Router,
    uri: &str,
    content_type: Option<&str>,
    body: &'static str,
) -> Response<Body> {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    app.oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Stub backend
// ---------------------------------------------------------------------------

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

/// Engine that reports a little progress, optionally waits on a gate,
/// then returns a fixed outcome.
pub struct StubEngine {
    outcome: Result<EngineOutput, EngineError>,
    gate: Option<Arc<Gate>>,
}

impl GenerationEngine for StubEngine {
    fn invoke(
        &self,
        _params: &NormalizedParams,
        progress: &dyn ProgressSink,
    ) -> Result<EngineOutput, EngineError> {
        progress.on_progress(25);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        progress.on_progress(75);
        self.outcome.clone()
    }
}

pub struct StubFactory {
    engine: Arc<StubEngine>,
}

impl StubFactory {
    pub fn succeeding(output_path: &str) -> Arc<Self> {
        Self::with(
            Ok(EngineOutput {
                output_path: output_path.to_string(),
            }),
            None,
        )
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::with(Err(EngineError::Execution(message.to_string())), None)
    }

    pub fn gated(gate: Arc<Gate>) -> Arc<Self> {
        Self::with(
            Ok(EngineOutput {
                output_path: "/tmp/a.mp4".to_string(),
            }),
            Some(gate),
        )
    }

    fn with(outcome: Result<EngineOutput, EngineError>, gate: Option<Arc<Gate>>) -> Arc<Self> {
        Arc::new(Self {
            engine: Arc::new(StubEngine { outcome, gate }),
        })
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
            model_count: 2,
            detail: None,
        }
    }

    fn create(&self) -> Result<Arc<dyn GenerationEngine>, EngineError> {
        Ok(self.engine.clone())
    }
}

/// Poll `GET /api/v1/jobs/{id}` until the job reaches a terminal status.
pub async fn wait_terminal(app: &Router, job_id: &str) -> serde_json::Value {
    let uri = format!("/api/v1/jobs/{job_id}");
    for _ in 0..500 {
        let json = body_json(get(app.clone(), &uri).await).await;
        let status = json["data"]["status"].as_str().unwrap().to_string();
        if matches!(status.as_str(), "completed" | "failed" | "cancelled") {
            return json;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish");
}
