//! Model and LoRA catalog read from the backend installation.
//!
//! The catalog is a plain directory scan. It never loads the engine, so
//! it is safe to serve while a generation is running.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use walkdir::WalkDir;

const CHECKPOINT_DIR: &str = "ckpts";
const MODEL_DIR: &str = "models";
const PRESET_DIR: &str = "defaults";
const LORA_DIR: &str = "loras";

const WEIGHTS_EXT: &str = "safetensors";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Checkpoint,
    Model,
    Preset,
}

/// One entry of the model listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEntry {
    pub name: String,
    /// Path relative to the scanned directory (weights files only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// The preset's `model` definition, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<Value>,
    #[serde(rename = "type")]
    pub kind: ModelKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoraEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// List checkpoints, model weights and presets under `backend_dir`.
///
/// Missing directories contribute nothing. Preset files that cannot be
/// read or parsed are skipped.
pub fn list_models(backend_dir: &Path) -> Vec<ModelEntry> {
    let mut entries = Vec::new();

    for (dir, kind) in [
        (CHECKPOINT_DIR, ModelKind::Checkpoint),
        (MODEL_DIR, ModelKind::Model),
    ] {
        let root = backend_dir.join(dir);
        for file in walk_files(&root, |p| has_extension(p, WEIGHTS_EXT)) {
            entries.push(ModelEntry {
                name: file_stem(&file),
                path: Some(relative(&root, &file)),
                model: None,
                kind,
            });
        }
    }

    let presets = backend_dir.join(PRESET_DIR);
    for file in walk_files(&presets, |p| has_extension(p, "json")) {
        let Some(preset) = read_preset(&file) else {
            tracing::debug!(path = %file.display(), "Skipping unreadable preset");
            continue;
        };
        let Some(model) = preset.get("model").cloned() else {
            continue;
        };
        let name = preset
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| file_stem(&file));
        entries.push(ModelEntry {
            name,
            path: None,
            model: Some(model),
            kind: ModelKind::Preset,
        });
    }

    entries
}

/// List LoRA weights under `backend_dir/loras`.
pub fn list_loras(backend_dir: &Path) -> Vec<LoraEntry> {
    let root = backend_dir.join(LORA_DIR);
    walk_files(&root, |p| has_extension(p, WEIGHTS_EXT))
        .into_iter()
        .map(|file| LoraEntry {
            name: file_stem(&file),
            path: relative(&root, &file),
            kind: "lora",
        })
        .collect()
}

/// Recursively collect regular files under `root` accepted by `keep`,
/// sorted by path.
///
/// Symlinks are followed so linked model folders are listed. Entries that
/// cannot be read, dangling links and links back into an ancestor are
/// skipped, so a missing `root` yields an empty list.
pub(crate) fn walk_files(root: &Path, keep: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                if e.depth() > 0 {
                    tracing::debug!(error = %e, "Skipping unreadable entry");
                }
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && keep(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    found.sort();
    found
}

fn read_preset(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
