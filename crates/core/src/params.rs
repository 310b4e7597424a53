//! Engine parameter table.
//!
//! Every keyword the backend's generation call requires is declared here
//! once, with its kind, default, and coercion rule. The backend tells
//! "unset" apart from "disabled" by sentinel value (`""`, `-1`, `0`), never
//! by absence, so every field is always present in a [`NormalizedParams`].
//!
//! The table is a versioned contract with the backend: bump
//! [`PARAM_TABLE_VERSION`] whenever a name, default, or accepted value
//! changes.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::resolution::DEFAULT_RESOLUTION;

/// Version of the parameter contract with the backend.
pub const PARAM_TABLE_VERSION: &str = "wan2gp-10.x";

// ---------------------------------------------------------------------------
// Table types
// ---------------------------------------------------------------------------

/// Primitive kind of an engine field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Int,
    Float,
    Bool,
    /// Nullable file path; `null` means "no input".
    Path,
    List,
    /// Passed through untouched.
    Any,
}

/// Default value of an engine field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Str(&'static str),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    EmptyList,
    EmptyObject,
}

impl ParamDefault {
    pub fn to_value(self) -> Value {
        match self {
            ParamDefault::Str(s) => Value::String(s.to_string()),
            ParamDefault::Int(i) => Value::from(i),
            ParamDefault::Float(f) => float_value(f),
            ParamDefault::Bool(b) => Value::Bool(b),
            ParamDefault::Null => Value::Null,
            ParamDefault::EmptyList => Value::Array(Vec::new()),
            ParamDefault::EmptyObject => Value::Object(Map::new()),
        }
    }
}

/// How a caller-supplied value is checked after kind coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamRule {
    /// Any value of the right kind.
    Plain,
    /// Inclusive numeric bounds.
    Range { min: f64, max: f64 },
    /// One of a fixed set of strings; `aliases` map caller spellings
    /// (e.g. `"none"`) onto accepted values (e.g. the `""` sentinel).
    Choice {
        values: &'static [&'static str],
        aliases: &'static [(&'static str, &'static str)],
    },
    /// Derived from the generation mode (see [`crate::modes`]).
    Mode,
    /// Must belong to the mode's compatible model set.
    Model,
    /// A `WIDTHxHEIGHT` string.
    Resolution,
}

/// One row of the parameter table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: ParamDefault,
    pub rule: ParamRule,
}

impl ParamSpec {
    const fn new(name: &'static str, kind: ParamKind, default: ParamDefault) -> Self {
        Self {
            name,
            kind,
            default,
            rule: ParamRule::Plain,
        }
    }

    const fn string(name: &'static str, default: &'static str) -> Self {
        Self::new(name, ParamKind::Str, ParamDefault::Str(default))
    }

    const fn int(name: &'static str, default: i64) -> Self {
        Self::new(name, ParamKind::Int, ParamDefault::Int(default))
    }

    const fn float(name: &'static str, default: f64) -> Self {
        Self::new(name, ParamKind::Float, ParamDefault::Float(default))
    }

    const fn flag(name: &'static str, default: bool) -> Self {
        Self::new(name, ParamKind::Bool, ParamDefault::Bool(default))
    }

    const fn path(name: &'static str) -> Self {
        Self::new(name, ParamKind::Path, ParamDefault::Null)
    }

    const fn list(name: &'static str) -> Self {
        Self::new(name, ParamKind::List, ParamDefault::EmptyList)
    }

    const fn object(name: &'static str) -> Self {
        Self::new(name, ParamKind::Any, ParamDefault::EmptyObject)
    }

    const fn range(mut self, min: f64, max: f64) -> Self {
        self.rule = ParamRule::Range { min, max };
        self
    }

    const fn choice(
        mut self,
        values: &'static [&'static str],
        aliases: &'static [(&'static str, &'static str)],
    ) -> Self {
        self.rule = ParamRule::Choice { values, aliases };
        self
    }

    const fn rule(mut self, rule: ParamRule) -> Self {
        self.rule = rule;
        self
    }
}

// ---------------------------------------------------------------------------
// Sentinel vocabularies
// ---------------------------------------------------------------------------

/// Caller spellings of "off" that map to the empty-string sentinel.
const DISABLED_ALIASES: &[(&str, &str)] = &[("none", ""), ("disabled", ""), ("off", "")];

const SAMPLE_SOLVERS: &[&str] = &["euler", "unipc", "dpm++", "causvid", "lcm"];
const GEN_TYPES: &[&str] = &["sequential", "parallel"];
const SKIP_CACHE_TYPES: &[&str] = &["", "tea", "mag"];
const TEMPORAL_UPSAMPLERS: &[&str] = &["", "rife2", "rife4"];
const SPATIAL_UPSAMPLERS: &[&str] = &["", "lanczos1.5", "lanczos2"];
const ATTENTION_MODES: &[&str] = &["", "sdpa", "sage", "sage2", "flash"];

/// Largest seed the backend accepts; `-1` asks for a random seed.
const MAX_SEED: f64 = 4_294_967_295.0;

// ---------------------------------------------------------------------------
// The table
// ---------------------------------------------------------------------------

/// Every field of the backend generation call, in call order.
pub const PARAM_TABLE: &[ParamSpec] = &[
    ParamSpec::string("task", ""),
    ParamSpec::int("image_mode", 0).rule(ParamRule::Mode),
    ParamSpec::string("prompt", ""),
    ParamSpec::string("alt_prompt", ""),
    ParamSpec::string("negative_prompt", ""),
    ParamSpec::string("resolution", DEFAULT_RESOLUTION).rule(ParamRule::Resolution),
    ParamSpec::int("video_length", 49).range(1.0, 1025.0),
    ParamSpec::float("duration_seconds", 2.0).range(0.0, 600.0),
    ParamSpec::float("pause_seconds", 0.0).range(0.0, 600.0),
    ParamSpec::int("batch_size", 1).range(1.0, 16.0),
    ParamSpec::int("seed", -1).range(-1.0, MAX_SEED),
    ParamSpec::string("force_fps", ""),
    ParamSpec::int("num_inference_steps", 20).range(1.0, 200.0),
    ParamSpec::float("guidance_scale", 7.5).range(0.0, 50.0),
    ParamSpec::float("guidance2_scale", 0.0).range(0.0, 50.0),
    ParamSpec::float("guidance3_scale", 0.0).range(0.0, 50.0),
    ParamSpec::float("switch_threshold", 0.5),
    ParamSpec::float("switch_threshold2", 0.5),
    ParamSpec::int("guidance_phases", 1).range(1.0, 3.0),
    ParamSpec::float("model_switch_phase", 0.5),
    ParamSpec::float("alt_guidance_scale", 0.0),
    ParamSpec::float("audio_guidance_scale", 0.0),
    ParamSpec::float("audio_scale", 0.0),
    ParamSpec::float("flow_shift", 0.0),
    ParamSpec::string("sample_solver", "euler").choice(SAMPLE_SOLVERS, &[]),
    ParamSpec::float("embedded_guidance_scale", 0.0),
    ParamSpec::int("repeat_generation", 1).range(1.0, 25.0),
    ParamSpec::string("multi_prompts_gen_type", "sequential").choice(GEN_TYPES, &[]),
    ParamSpec::string("multi_images_gen_type", "sequential").choice(GEN_TYPES, &[]),
    ParamSpec::string("skip_steps_cache_type", "").choice(SKIP_CACHE_TYPES, DISABLED_ALIASES),
    ParamSpec::float("skip_steps_multiplier", 1.0),
    ParamSpec::float("skip_steps_start_step_perc", 0.0).range(0.0, 100.0),
    ParamSpec::list("activated_loras"),
    ParamSpec::object("loras_multipliers"),
    ParamSpec::string("image_prompt_type", ""),
    ParamSpec::path("image_start"),
    ParamSpec::path("image_end"),
    ParamSpec::string("model_mode", "wan"),
    ParamSpec::path("video_source"),
    ParamSpec::string("keep_frames_video_source", ""),
    ParamSpec::float("input_video_strength", 0.8).range(0.0, 2.0),
    ParamSpec::string("video_prompt_type", ""),
    ParamSpec::list("image_refs"),
    ParamSpec::list("frames_positions"),
    ParamSpec::path("video_guide"),
    ParamSpec::path("image_guide"),
    ParamSpec::string("keep_frames_video_guide", ""),
    ParamSpec::float("denoising_strength", 0.8).range(0.0, 1.0),
    ParamSpec::float("masking_strength", 1.0).range(0.0, 1.0),
    ParamSpec::string("video_guide_outpainting", ""),
    ParamSpec::path("video_mask"),
    ParamSpec::path("image_mask"),
    ParamSpec::float("control_net_weight", 1.0),
    ParamSpec::float("control_net_weight2", 1.0),
    ParamSpec::float("control_net_weight_alt", 0.0),
    ParamSpec::float("motion_amplitude", 1.0).range(0.0, 2.0),
    ParamSpec::int("mask_expand", 4),
    ParamSpec::path("audio_guide"),
    ParamSpec::path("audio_guide2"),
    ParamSpec::path("custom_guide"),
    ParamSpec::path("audio_source"),
    ParamSpec::string("audio_prompt_type", ""),
    ParamSpec::list("speakers_locations"),
    ParamSpec::int("sliding_window_size", 0).range(0.0, 1025.0),
    ParamSpec::int("sliding_window_overlap", 0).range(0.0, 1025.0),
    ParamSpec::float("sliding_window_color_correction_strength", 0.0),
    ParamSpec::float("sliding_window_overlap_noise", 0.0),
    ParamSpec::flag("sliding_window_discard_last_frames", false),
    ParamSpec::float("image_refs_relative_size", 1.0),
    ParamSpec::flag("remove_background_images_ref", false),
    ParamSpec::string("temporal_upsampling", "").choice(TEMPORAL_UPSAMPLERS, DISABLED_ALIASES),
    ParamSpec::string("spatial_upsampling", "").choice(SPATIAL_UPSAMPLERS, DISABLED_ALIASES),
    ParamSpec::float("film_grain_intensity", 0.0),
    ParamSpec::float("film_grain_saturation", 0.0),
    ParamSpec::int("MMAudio_setting", 0).range(0.0, 2.0),
    ParamSpec::string("MMAudio_prompt", ""),
    ParamSpec::string("MMAudio_neg_prompt", ""),
    ParamSpec::int("RIFLEx_setting", 0).range(0.0, 2.0),
    ParamSpec::float("NAG_scale", 0.0),
    ParamSpec::float("NAG_tau", 1.0),
    ParamSpec::float("NAG_alpha", 0.0),
    ParamSpec::flag("slg_switch", false),
    ParamSpec::list("slg_layers"),
    ParamSpec::float("slg_start_perc", 0.0).range(0.0, 1.0),
    ParamSpec::float("slg_end_perc", 1.0).range(0.0, 1.0),
    ParamSpec::flag("apg_switch", false),
    ParamSpec::flag("cfg_star_switch", false),
    ParamSpec::int("cfg_zero_step", 0),
    ParamSpec::int("prompt_enhancer", 0).range(0.0, 2.0),
    ParamSpec::int("min_frames_if_references", 0),
    ParamSpec::int("override_profile", -1).range(-1.0, 5.0),
    ParamSpec::string("override_attention", "").choice(ATTENTION_MODES, DISABLED_ALIASES),
    ParamSpec::float("temperature", 1.0),
    ParamSpec::object("custom_settings"),
    ParamSpec::float("top_p", 1.0).range(0.0, 1.0),
    ParamSpec::int("top_k", 200),
    ParamSpec::int("self_refiner_setting", 0),
    ParamSpec::list("self_refiner_plan"),
    ParamSpec::float("self_refiner_f_uncertainty", 0.5),
    ParamSpec::float("self_refiner_certain_percentage", 50.0).range(0.0, 100.0),
    ParamSpec::string("output_filename", ""),
    ParamSpec::string("model_type", "t2v_2_2").rule(ParamRule::Model),
];

/// Caller-facing field names and the engine field each one feeds.
pub const REQUEST_ALIASES: &[(&str, &str)] = &[
    ("mode", "image_mode"),
    ("image_path", "image_start"),
    ("steps", "num_inference_steps"),
    ("frames", "video_length"),
    ("duration", "duration_seconds"),
    ("model", "model_type"),
    ("profile", "override_profile"),
];

/// Image-mode convenience: one caller value drives both motion fields.
pub const MOTION_SCALE_FIELD: &str = "motion_scale";
pub const MOTION_SCALE_TARGETS: &[&str] = &["motion_amplitude", "input_video_strength"];

/// Look up a table row by engine field name.
pub fn spec(name: &str) -> Option<&'static ParamSpec> {
    PARAM_TABLE.iter().find(|s| s.name == name)
}

/// Resolve a caller-facing field name to its engine field name.
pub fn engine_field(request_field: &str) -> Option<&'static str> {
    if let Some((_, target)) = REQUEST_ALIASES.iter().find(|(a, _)| *a == request_field) {
        return Some(*target);
    }
    spec(request_field).map(|s| s.name)
}

pub(crate) fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Normalized set
// ---------------------------------------------------------------------------

/// The complete, typed parameter set handed to the engine.
///
/// Built only by [`crate::normalize`]; holds exactly one value per
/// [`PARAM_TABLE`] row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedParams {
    values: Map<String, Value>,
}

impl NormalizedParams {
    pub(crate) fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn prompt(&self) -> &str {
        self.get_str("prompt").unwrap_or_default()
    }

    pub fn output_filename(&self) -> &str {
        self.get_str("output_filename").unwrap_or_default()
    }

    /// Fill the `output_filename` sentinel if the caller left it empty.
    ///
    /// Consumes the set: it is finalized once, before the job is queued.
    pub fn with_default_output_filename(mut self, name: &str) -> Self {
        if self.output_filename().is_empty() {
            self.values
                .insert("output_filename".to_string(), Value::String(name.to_string()));
        }
        self
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn field_names_are_unique() {
        let mut seen = HashSet::new();
        for spec in PARAM_TABLE {
            assert!(seen.insert(spec.name), "duplicate field {}", spec.name);
        }
    }

    #[test]
    fn defaults_match_their_kind() {
        for spec in PARAM_TABLE {
            let ok = matches!(
                (spec.kind, spec.default),
                (ParamKind::Str, ParamDefault::Str(_))
                    | (ParamKind::Int, ParamDefault::Int(_))
                    | (ParamKind::Float, ParamDefault::Float(_))
                    | (ParamKind::Bool, ParamDefault::Bool(_))
                    | (ParamKind::Path, ParamDefault::Null)
                    | (ParamKind::List, ParamDefault::EmptyList)
                    | (ParamKind::Any, _)
            );
            assert!(ok, "{} default does not match kind {:?}", spec.name, spec.kind);
        }
    }

    #[test]
    fn defaults_satisfy_their_rules() {
        for spec in PARAM_TABLE {
            match (spec.rule, spec.default) {
                (ParamRule::Range { min, max }, ParamDefault::Int(v)) => {
                    assert!((min..=max).contains(&(v as f64)), "{}", spec.name);
                }
                (ParamRule::Range { min, max }, ParamDefault::Float(v)) => {
                    assert!((min..=max).contains(&v), "{}", spec.name);
                }
                (ParamRule::Choice { values, .. }, ParamDefault::Str(v)) => {
                    assert!(values.contains(&v), "{}", spec.name);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn aliases_point_at_table_fields() {
        for (alias, target) in REQUEST_ALIASES {
            assert!(spec(target).is_some(), "{alias} -> {target} missing");
            assert!(spec(alias).is_none(), "{alias} shadows an engine field");
        }
        for target in MOTION_SCALE_TARGETS {
            assert!(spec(target).is_some());
        }
    }

    #[test]
    fn sentinel_defaults_for_unset_concepts() {
        assert_eq!(spec("seed").unwrap().default, ParamDefault::Int(-1));
        assert_eq!(spec("force_fps").unwrap().default, ParamDefault::Str(""));
        assert_eq!(spec("override_profile").unwrap().default, ParamDefault::Int(-1));
        assert_eq!(spec("temporal_upsampling").unwrap().default, ParamDefault::Str(""));
        assert_eq!(spec("image_start").unwrap().default, ParamDefault::Null);
    }

    #[test]
    fn engine_field_resolves_aliases_and_direct_names() {
        assert_eq!(engine_field("steps"), Some("num_inference_steps"));
        assert_eq!(engine_field("num_inference_steps"), Some("num_inference_steps"));
        assert_eq!(engine_field("image_path"), Some("image_start"));
        assert_eq!(engine_field("unknown"), None);
    }
}
