//! Locating the artifact a generation wrote when the runner did not say.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::catalog::walk_files;
use crate::error::EngineError;

/// Extensions tried, in order, when no file matches the requested name.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "avi"];

/// Find the output of a generation in `save_dir`.
///
/// Prefers the newest file whose name contains `output_filename`, then the
/// newest video file of each known extension in turn.
pub fn discover_output(save_dir: &Path, output_filename: &str) -> Result<PathBuf, EngineError> {
    if !output_filename.is_empty() {
        let named = walk_files(save_dir, |p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(output_filename))
        });
        if let Some(path) = newest(named) {
            return Ok(path);
        }
    }

    for ext in VIDEO_EXTENSIONS {
        let videos = walk_files(save_dir, |p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        });
        if let Some(path) = newest(videos) {
            return Ok(path);
        }
    }

    Err(EngineError::Execution("no output file produced".into()))
}

/// Newest by modification time; ties go to the greatest path.
fn newest(paths: Vec<PathBuf>) -> Option<PathBuf> {
    paths
        .into_iter()
        .map(|p| {
            let modified = p
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, p)
        })
        .max()
        .map(|(_, p)| p)
}
