//! Generation modes and the model families compatible with each.
//!
//! The backend selects its pipeline from an integer `image_mode` and a
//! `model_type` string. Callers name a mode instead; this table maps the
//! name to the integer code and restricts the model selector to the
//! checkpoints that can actually run in that mode.

/// A caller-facing generation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationMode {
    /// Canonical lowercase name.
    pub name: &'static str,
    /// Value passed to the backend as `image_mode`.
    pub image_mode: i64,
    /// Whether a source image (`image_path`) is mandatory.
    pub requires_image: bool,
    /// Compatible `model_type` values. The first entry is the mode default.
    pub models: &'static [&'static str],
}

pub const MODE_T2V: GenerationMode = GenerationMode {
    name: "t2v",
    image_mode: 0,
    requires_image: false,
    models: &["t2v_2_2", "t2v", "t2v_1.3B", "hunyuan", "ltxv_13B"],
};

pub const MODE_I2V: GenerationMode = GenerationMode {
    name: "i2v",
    image_mode: 1,
    requires_image: true,
    models: &["i2v_2_2", "i2v", "i2v_720p", "hunyuan_i2v", "ltxv_13B"],
};

pub const MODE_T2I: GenerationMode = GenerationMode {
    name: "t2i",
    image_mode: 1,
    requires_image: false,
    models: &["flux", "qwen_image_20B", "t2v_2_2"],
};

pub const MODE_INPAINT: GenerationMode = GenerationMode {
    name: "inpaint",
    image_mode: 2,
    requires_image: true,
    models: &["flux_dev_kontext", "qwen_image_edit_20B"],
};

/// All modes. Lookup by integer code returns the first match, so the
/// order here decides what a bare `image_mode: 1` means.
pub const ALL_MODES: &[GenerationMode] = &[MODE_T2V, MODE_I2V, MODE_T2I, MODE_INPAINT];

/// The mode used when the caller names none.
pub const DEFAULT_MODE: GenerationMode = MODE_T2V;

/// Accepted spellings for each mode (matched case-insensitively).
const MODE_ALIASES: &[(&str, GenerationMode)] = &[
    ("t2v", MODE_T2V),
    ("text_to_video", MODE_T2V),
    ("i2v", MODE_I2V),
    ("i2v_start", MODE_I2V),
    ("image_to_video", MODE_I2V),
    ("t2i", MODE_T2I),
    ("text_to_image", MODE_T2I),
    ("inpaint", MODE_INPAINT),
];

/// Shorthand model names accepted from callers.
const MODEL_ALIASES: &[(&str, &str)] = &[
    ("wan", "t2v_2_2"),
    ("wan_t2v", "t2v_2_2"),
    ("wan_i2v", "i2v_2_2"),
    ("hunyuan_video", "hunyuan"),
    ("ltx", "ltxv_13B"),
];

/// Resolve a mode by name.
pub fn mode_by_name(name: &str) -> Option<GenerationMode> {
    let lowered = name.trim().to_ascii_lowercase();
    MODE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, mode)| *mode)
}

/// Resolve a mode by the backend's integer code.
pub fn mode_by_code(code: i64) -> Option<GenerationMode> {
    ALL_MODES.iter().copied().find(|m| m.image_mode == code)
}

/// Expand a model shorthand to the backend's `model_type`.
pub fn canonical_model(name: &str) -> &str {
    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

impl GenerationMode {
    pub fn default_model(&self) -> &'static str {
        self.models[0]
    }

    pub fn supports_model(&self, model_type: &str) -> bool {
        self.models.contains(&model_type)
    }
}
