//! Boundary to the Wan2GP generation backend.
//!
//! The orchestration layer only sees the [`GenerationEngine`] and
//! [`EngineFactory`] traits. [`command`] provides the production adapter
//! that drives the backend through a runner subprocess; [`lazy`] wraps any
//! factory so the engine is built at most once, on first use.

pub mod catalog;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod lazy;
pub mod outputs;
pub mod protocol;

pub use engine::{EngineOutput, GenerationEngine, ProgressSink};
pub use error::EngineError;
pub use lazy::{BackendProbe, EngineFactory, LazyEngine};
