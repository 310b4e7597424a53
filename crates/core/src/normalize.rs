//! Request normalization.
//!
//! Turns a sparse caller request into a [`NormalizedParams`] holding every
//! [`PARAM_TABLE`] field. `prompt` (and `image_path` in image modes) are
//! critical and always fail validation when missing or mistyped. Every
//! other field is non-critical: an invalid value is replaced by its
//! default and reported as an [`Adjustment`], unless the policy is
//! [`NormalizePolicy::Strict`], in which case it fails instead.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::modes::{canonical_model, mode_by_code, mode_by_name, GenerationMode, DEFAULT_MODE};
use crate::params::{
    engine_field, float_value, NormalizedParams, ParamKind, ParamRule, ParamSpec,
    MOTION_SCALE_FIELD, MOTION_SCALE_TARGETS, PARAM_TABLE,
};
use crate::resolution::Resolution;

/// What to do with an invalid non-critical field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NormalizePolicy {
    /// Replace with the default and report an [`Adjustment`].
    #[default]
    Lenient,
    /// Reject the request.
    Strict,
}

/// A non-critical field that was replaced by its default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Adjustment {
    pub field: &'static str,
    pub reason: String,
    pub applied: Value,
}

/// Output of [`normalize_with`].
#[derive(Debug, Clone)]
pub struct Normalized {
    pub params: NormalizedParams,
    pub mode: GenerationMode,
    pub adjustments: Vec<Adjustment>,
}

/// Normalize with the lenient policy.
pub fn normalize(raw: &Value) -> Result<Normalized, CoreError> {
    normalize_with(raw, NormalizePolicy::Lenient)
}

pub fn normalize_with(raw: &Value, policy: NormalizePolicy) -> Result<Normalized, CoreError> {
    let request = raw
        .as_object()
        .ok_or_else(|| CoreError::validation("request", "Request body must be a JSON object"))?;
    let inputs = resolve_aliases(request);

    let prompt = required_string(&inputs, "prompt", "prompt")?;

    let mut adjuster = Adjuster {
        policy,
        adjustments: Vec::new(),
    };

    // Report mode problems under the key the caller actually sent.
    let mode_field = if request.contains_key("image_mode") {
        "image_mode"
    } else {
        "mode"
    };
    let mode = resolve_mode(mode_field, inputs.get("image_mode"), &mut adjuster)?;
    if mode.requires_image {
        required_string(&inputs, "image_start", "image_path")?;
    }

    let mut values = Map::with_capacity(PARAM_TABLE.len());
    for spec in PARAM_TABLE {
        let value = match spec.rule {
            ParamRule::Mode => Value::from(mode.image_mode),
            ParamRule::Model => resolve_model(spec, inputs.get(spec.name), mode, &mut adjuster)?,
            _ if spec.name == "prompt" => Value::String(prompt.clone()),
            _ => match inputs.get(spec.name) {
                None | Some(Value::Null) => spec.default.to_value(),
                Some(raw) => match coerce(spec, raw) {
                    Ok(value) => value,
                    Err(reason) => adjuster.replace(spec, reason)?,
                },
            },
        };
        values.insert(spec.name.to_string(), value);
    }

    Ok(Normalized {
        params: NormalizedParams::from_map(values),
        mode,
        adjustments: adjuster.adjustments,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Adjuster {
    policy: NormalizePolicy,
    adjustments: Vec<Adjustment>,
}

impl Adjuster {
    /// Record that `spec` falls back to its default, or fail under the
    /// strict policy.
    fn replace(&mut self, spec: &ParamSpec, reason: String) -> Result<Value, CoreError> {
        self.replace_with(spec.name, spec.default.to_value(), reason)
    }

    fn replace_with(
        &mut self,
        field: &'static str,
        applied: Value,
        reason: String,
    ) -> Result<Value, CoreError> {
        if self.policy == NormalizePolicy::Strict {
            return Err(CoreError::validation(field, reason));
        }
        self.adjustments.push(Adjustment {
            field,
            reason,
            applied: applied.clone(),
        });
        Ok(applied)
    }
}

/// Map caller-facing names onto engine field names.
///
/// An engine field given directly wins over its alias. Unknown keys are
/// dropped.
fn resolve_aliases(request: &Map<String, Value>) -> Map<String, Value> {
    let mut inputs = Map::new();
    for (key, value) in request {
        if let Some(field) = engine_field(key) {
            if field == key.as_str() {
                inputs.insert(key.clone(), value.clone());
            }
        }
    }
    for (key, value) in request {
        match engine_field(key) {
            Some(field) if field != key.as_str() => {
                inputs.entry(field.to_string()).or_insert_with(|| value.clone());
            }
            Some(_) => {}
            None if key == MOTION_SCALE_FIELD => {
                for target in MOTION_SCALE_TARGETS {
                    inputs
                        .entry(target.to_string())
                        .or_insert_with(|| value.clone());
                }
            }
            None => {}
        }
    }
    inputs
}

fn required_string(
    inputs: &Map<String, Value>,
    field: &str,
    caller_name: &str,
) -> Result<String, CoreError> {
    match inputs.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(CoreError::validation(caller_name, "must not be empty")),
        None | Some(Value::Null) => Err(CoreError::validation(caller_name, "is required")),
        Some(other) => Err(CoreError::validation(
            caller_name,
            format!("must be a string, got {}", kind_name(other)),
        )),
    }
}

fn resolve_mode(
    caller_name: &'static str,
    raw: Option<&Value>,
    adjuster: &mut Adjuster,
) -> Result<GenerationMode, CoreError> {
    let resolved = match raw {
        None | Some(Value::Null) => return Ok(DEFAULT_MODE),
        Some(Value::String(name)) => mode_by_name(name),
        Some(Value::Number(n)) => n.as_i64().and_then(mode_by_code),
        Some(_) => None,
    };
    match resolved {
        Some(mode) => Ok(mode),
        None => {
            adjuster.replace_with(
                caller_name,
                Value::from(DEFAULT_MODE.image_mode),
                format!("unknown generation mode {}", display(raw)),
            )?;
            Ok(DEFAULT_MODE)
        }
    }
}

fn resolve_model(
    spec: &ParamSpec,
    raw: Option<&Value>,
    mode: GenerationMode,
    adjuster: &mut Adjuster,
) -> Result<Value, CoreError> {
    let fallback = Value::String(mode.default_model().to_string());
    match raw {
        None | Some(Value::Null) => Ok(fallback),
        Some(Value::String(name)) => {
            let model = canonical_model(name.trim());
            if mode.supports_model(model) {
                Ok(Value::String(model.to_string()))
            } else {
                adjuster.replace_with(
                    spec.name,
                    fallback,
                    format!("model '{name}' is not compatible with mode '{}'", mode.name),
                )
            }
        }
        Some(other) => adjuster.replace_with(
            spec.name,
            fallback,
            format!("must be a string, got {}", kind_name(other)),
        ),
    }
}

/// Coerce a caller value into the field's kind and check its rule.
fn coerce(spec: &ParamSpec, raw: &Value) -> Result<Value, String> {
    let value = coerce_kind(spec.kind, raw)?;
    match spec.rule {
        ParamRule::Range { min, max } => {
            let n = value.as_f64().unwrap_or(f64::NAN);
            if (min..=max).contains(&n) {
                Ok(value)
            } else {
                Err(format!("{value} is outside {min}..={max}"))
            }
        }
        ParamRule::Choice { values, aliases } => {
            let s = value.as_str().unwrap_or_default();
            let s = aliases
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(s))
                .map(|(_, target)| *target)
                .unwrap_or(s);
            if values.contains(&s) {
                Ok(Value::String(s.to_string()))
            } else {
                Err(format!(
                    "'{s}' is not one of: {}",
                    values
                        .iter()
                        .map(|v| if v.is_empty() { "\"\"" } else { v })
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            }
        }
        ParamRule::Resolution => {
            let s = value.as_str().unwrap_or_default();
            Resolution::parse(s)
                .map(|r| Value::String(r.to_string()))
                .map_err(|e| e.to_string())
        }
        ParamRule::Plain | ParamRule::Mode | ParamRule::Model => Ok(value),
    }
}

fn coerce_kind(kind: ParamKind, raw: &Value) -> Result<Value, String> {
    let mismatch = || format!("expected {}, got {}", kind_label(kind), kind_name(raw));
    match kind {
        ParamKind::Str => match raw {
            Value::String(_) => Ok(raw.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            // Gradio-style `{"__type__": "update", "value": ...}` wrappers.
            Value::Object(obj) => match obj.get("value") {
                Some(Value::String(s)) => Ok(Value::String(s.clone())),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        ParamKind::Int => match raw {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::from(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Value::from(f as i64)),
                        _ => Err(mismatch()),
                    }
                }
            }
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| mismatch()),
            Value::Bool(b) => Ok(Value::from(i64::from(*b))),
            _ => Err(mismatch()),
        },
        ParamKind::Float => match raw {
            Value::Number(n) => n.as_f64().map(float_value).ok_or_else(mismatch),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(float_value)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        ParamKind::Bool => match raw {
            Value::Bool(_) => Ok(raw.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(mismatch()),
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        ParamKind::Path => match raw {
            Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
            Value::String(_) => Ok(raw.clone()),
            _ => Err(mismatch()),
        },
        ParamKind::List => match raw {
            Value::Array(_) => Ok(raw.clone()),
            _ => Err(mismatch()),
        },
        ParamKind::Any => Ok(raw.clone()),
    }
}

fn kind_label(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Str => "a string",
        ParamKind::Int => "an integer",
        ParamKind::Float => "a number",
        ParamKind::Bool => "a boolean",
        ParamKind::Path => "a file path",
        ParamKind::List => "a list",
        ParamKind::Any => "any value",
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn display(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
