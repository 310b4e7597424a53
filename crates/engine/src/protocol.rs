//! Line protocol spoken by the backend runner on stdout.
//!
//! One JSON object per line, discriminated by `event`:
//!
//! ```text
//! {"event": "progress", "percent": 40}
//! {"event": "progress", "data": [40, "denoising"]}
//! {"event": "status", "message": "loading model"}
//! {"event": "completed", "output_path": "/outputs/gen_x.mp4"}
//! {"event": "error", "message": "CUDA out of memory"}
//! {"event": "unavailable", "message": "could not import wgp"}
//! ```
//!
//! `unavailable` means the runner could not reach the backend at all, as
//! opposed to a generation that started and failed.

use serde::Deserialize;
use serde_json::Value;

/// A decoded runner line.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    /// Progress tick. `None` when the line carried no usable number.
    Progress(Option<i64>),
    Status(String),
    Completed { output_path: Option<String> },
    Error(String),
    Unavailable(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum RawEvent {
    Progress {
        #[serde(default)]
        percent: Option<Value>,
        #[serde(default)]
        data: Option<Value>,
    },
    Status {
        #[serde(default)]
        message: String,
    },
    Completed {
        #[serde(default)]
        output_path: Option<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    Unavailable {
        #[serde(default)]
        message: String,
    },
}

/// Decode one stdout line. Returns `None` for anything that is not a
/// protocol message (backend chatter, blank lines).
pub fn parse_line(line: &str) -> Option<RunnerEvent> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    let raw: RawEvent = serde_json::from_str(line).ok()?;
    Some(match raw {
        RawEvent::Progress { percent, data } => {
            let value = percent.or_else(|| data.and_then(|d| d.get(0).cloned()));
            RunnerEvent::Progress(value.as_ref().and_then(percent_value))
        }
        RawEvent::Status { message } => RunnerEvent::Status(message),
        RawEvent::Completed { output_path } => RunnerEvent::Completed {
            output_path: output_path.filter(|p| !p.trim().is_empty()),
        },
        RawEvent::Error { message } => RunnerEvent::Error(message),
        RawEvent::Unavailable { message } => RunnerEvent::Unavailable(message),
    })
}

/// Whole-number percent from an int, a float (truncated) or a numeric string.
fn percent_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}
