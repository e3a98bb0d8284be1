//! Parameter schema — typed specs with defaults and optional bounds.
//!
//! A strategy publishes a list of [`ParamSpec`]s; callers override any subset
//! and [`merge_params`] produces the full, validated assignment the strategy
//! actually runs with. Bounds double as the source for `*` auto-grids in the
//! optimizer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single parameter value. Untagged so JSON/TOML read naturally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(v) => write!(f, "{v}"),
        }
    }
}

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Int,
    Float,
    Bool,
    Str,
}

/// Declaration of one strategy parameter.
///
/// `min`/`max`/`step` are optional; when all three are present the optimizer
/// can derive a grid automatically (`key=*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub key: String,
    pub ty: ParamType,
    pub default: ParamValue,
    pub label: String,
    pub help: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

impl ParamSpec {
    pub fn int(key: &str, default: i64, label: &str, min: f64, max: f64, step: f64) -> Self {
        Self {
            key: key.to_string(),
            ty: ParamType::Int,
            default: ParamValue::Int(default),
            label: label.to_string(),
            help: String::new(),
            min: Some(min),
            max: Some(max),
            step: Some(step),
        }
    }

    pub fn float(key: &str, default: f64, label: &str, min: f64, max: f64, step: f64) -> Self {
        Self {
            key: key.to_string(),
            ty: ParamType::Float,
            default: ParamValue::Float(default),
            label: label.to_string(),
            help: String::new(),
            min: Some(min),
            max: Some(max),
            step: Some(step),
        }
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }
}

/// A full parameter assignment. BTreeMap keeps iteration (and therefore
/// serialization and fingerprints) deterministic.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Errors from parameter parsing and validation.
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("bad param '{0}': use key=value")]
    BadKeyValue(String),
    #[error("unknown param '{key}'; known: {known:?}")]
    UnknownKey { key: String, known: Vec<String> },
    #[error("cannot coerce '{value}' to {ty:?}")]
    Coerce { value: String, ty: ParamType },
    #[error("param '{key}' = {value} below min {min}")]
    BelowMin { key: String, value: f64, min: f64 },
    #[error("param '{key}' = {value} above max {max}")]
    AboveMax { key: String, value: f64, max: f64 },
}

/// Coerce a string literal into a typed value.
pub fn coerce(value: &str, ty: ParamType) -> Result<ParamValue, ParamError> {
    let v = value.trim();
    let err = || ParamError::Coerce {
        value: value.to_string(),
        ty,
    };
    match ty {
        ParamType::Int => v
            .parse::<f64>()
            .map(|f| ParamValue::Int(f as i64))
            .map_err(|_| err()),
        ParamType::Float => v.parse::<f64>().map(ParamValue::Float).map_err(|_| err()),
        ParamType::Bool => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "t" | "yes" | "y" | "on" => Ok(ParamValue::Bool(true)),
            "0" | "false" | "f" | "no" | "n" | "off" => Ok(ParamValue::Bool(false)),
            _ => Err(err()),
        },
        ParamType::Str => Ok(ParamValue::Str(v.to_string())),
    }
}

/// Parse `key=value` override tokens against a schema.
pub fn parse_kv_list(kvs: &[String], schema: &[ParamSpec]) -> Result<ParamSet, ParamError> {
    let mut out = ParamSet::new();
    for kv in kvs {
        let Some((key, value)) = kv.split_once('=') else {
            return Err(ParamError::BadKeyValue(kv.clone()));
        };
        let key = key.trim();
        let spec = find_spec(schema, key)?;
        out.insert(key.to_string(), coerce(value, spec.ty)?);
    }
    Ok(out)
}

/// Fill defaults and validate bounds; overrides win over defaults.
pub fn merge_params(overrides: &ParamSet, schema: &[ParamSpec]) -> Result<ParamSet, ParamError> {
    let mut params: ParamSet = schema
        .iter()
        .map(|s| (s.key.clone(), s.default.clone()))
        .collect();
    for (key, value) in overrides {
        // Unknown overrides are rejected rather than silently carried.
        find_spec(schema, key)?;
        params.insert(key.clone(), value.clone());
    }
    for spec in schema {
        if let Some(value) = params.get(&spec.key).and_then(|v| v.as_f64()) {
            if let Some(min) = spec.min {
                if value < min {
                    return Err(ParamError::BelowMin {
                        key: spec.key.clone(),
                        value,
                        min,
                    });
                }
            }
            if let Some(max) = spec.max {
                if value > max {
                    return Err(ParamError::AboveMax {
                        key: spec.key.clone(),
                        value,
                        max,
                    });
                }
            }
        }
    }
    Ok(params)
}

pub(crate) fn find_spec<'a>(
    schema: &'a [ParamSpec],
    key: &str,
) -> Result<&'a ParamSpec, ParamError> {
    schema
        .iter()
        .find(|s| s.key == key)
        .ok_or_else(|| ParamError::UnknownKey {
            key: key.to_string(),
            known: schema.iter().map(|s| s.key.clone()).collect(),
        })
}
