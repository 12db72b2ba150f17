// THEORY:
// Every algorithm is configured by a flat key/value map. The same map shape
// arrives from two places: the command line (`grid:cell_size=4`) and a JSON
// pipeline file (`{"algorithm": "grid", "params": {"cell_size": 4}}`). Typed
// getters turn the loose map into validated values and report mistakes as
// `InvalidParameter`, naming the algorithm. Unknown keys are rejected so a
// typo never silently falls back to a default.

use crate::error::{PbnError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One parameter value. `Null` (JSON `null`) reads as "not set".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Parses CLI text: integer, then float, then boolean, else text.
    pub fn parse(text: &str) -> Self {
        if let Ok(i) = text.parse::<i64>() {
            ParamValue::Int(i)
        } else if let Ok(f) = text.parse::<f64>() {
            ParamValue::Float(f)
        } else if let Ok(b) = text.parse::<bool>() {
            ParamValue::Bool(b)
        } else {
            ParamValue::Text(text.to_string())
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => write!(f, "none"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Ordered key/value parameters of one algorithm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamMap(BTreeMap<String, ParamValue>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The value under `key`, treating `Null` as absent.
    fn value(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key).filter(|value| **value != ParamValue::Null)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Fails if any key is not in `allowed`.
    pub fn ensure_known(&self, algorithm: &str, allowed: &[&str]) -> Result<()> {
        match self.0.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(PbnError::invalid(
                algorithm,
                format!("unknown parameter {key:?} (expected one of {allowed:?})"),
            )),
            None => Ok(()),
        }
    }

    pub fn int(&self, algorithm: &str, key: &str) -> Result<Option<i64>> {
        match self.value(key) {
            None => Ok(None),
            Some(ParamValue::Int(i)) => Ok(Some(*i)),
            Some(ParamValue::Float(f)) if f.fract() == 0.0 && f.is_finite() => Ok(Some(*f as i64)),
            Some(other) => Err(PbnError::invalid(algorithm, format!("{key} must be an integer, got {other}"))),
        }
    }

    pub fn required_int(&self, algorithm: &str, key: &str) -> Result<i64> {
        self.int(algorithm, key)?
            .ok_or_else(|| PbnError::invalid(algorithm, format!("missing required parameter {key}")))
    }

    pub fn float(&self, algorithm: &str, key: &str) -> Result<Option<f64>> {
        match self.value(key) {
            None => Ok(None),
            Some(ParamValue::Int(i)) => Ok(Some(*i as f64)),
            Some(ParamValue::Float(f)) => Ok(Some(*f)),
            Some(other) => Err(PbnError::invalid(algorithm, format!("{key} must be a number, got {other}"))),
        }
    }

    pub fn bool(&self, algorithm: &str, key: &str) -> Result<Option<bool>> {
        match self.value(key) {
            None => Ok(None),
            Some(ParamValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(PbnError::invalid(algorithm, format!("{key} must be true or false, got {other}"))),
        }
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.value(key).map(ParamValue::to_string)
    }

    /// An optional seed: absent, `none`, or a non-negative integer.
    pub fn seed(&self, algorithm: &str, key: &str) -> Result<Option<u64>> {
        match self.value(key) {
            None => Ok(None),
            Some(ParamValue::Text(t)) if t.eq_ignore_ascii_case("none") => Ok(None),
            Some(ParamValue::Int(i)) if *i >= 0 => Ok(Some(*i as u64)),
            Some(other) => Err(PbnError::invalid(
                algorithm,
                format!("{key} must be a non-negative integer or none, got {other}"),
            )),
        }
    }
}

impl FromIterator<(String, ParamValue)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        ParamMap(iter.into_iter().collect())
    }
}

/// One stage of a pipeline: an algorithm name and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub algorithm: String,
    #[serde(default)]
    pub params: ParamMap,
}

impl StageSpec {
    pub fn new(algorithm: &str, params: ParamMap) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            params,
        }
    }
}

impl FromStr for StageSpec {
    type Err = PbnError;

    /// Parses `name` or `name:key=value,key=value`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, rest) = match s.split_once(':') {
            Some((name, rest)) => (name.trim(), rest.trim()),
            None => (s.trim(), ""),
        };
        if name.is_empty() {
            return Err(PbnError::Config(format!("stage spec {s:?} has no algorithm name")));
        }
        let mut params = ParamMap::new();
        for pair in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| PbnError::Config(format!("parameter {pair:?} in {s:?} is not key=value")))?;
            params.insert(key.trim(), ParamValue::parse(value.trim()));
        }
        Ok(StageSpec::new(name, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_spec_parses_name_and_params() {
        let spec: StageSpec = "kmeans:num_clusters=8,spatial_weight=0.5,seed=none".parse().unwrap();
        assert_eq!(spec.algorithm, "kmeans");
        assert_eq!(spec.params.int("kmeans", "num_clusters").unwrap(), Some(8));
        assert_eq!(spec.params.float("kmeans", "spatial_weight").unwrap(), Some(0.5));
        assert_eq!(spec.params.seed("kmeans", "seed").unwrap(), None);

        let bare: StageSpec = "merge".parse().unwrap();
        assert!(bare.params.is_empty());
        assert!("grid:cell_size".parse::<StageSpec>().is_err());
    }

    #[test]
    fn typed_getters_reject_wrong_types() {
        let params = ParamMap::new().with("cell_size", "big").with("flag", 3i64);
        assert!(params.int("grid", "cell_size").is_err());
        assert!(params.bool("grid", "flag").is_err());
        assert!(params.required_int("grid", "missing").is_err());
        assert_eq!(params.float("grid", "flag").unwrap(), Some(3.0));
    }

    #[test]
    fn json_null_means_unset() {
        let spec: StageSpec =
            serde_json::from_str(r#"{"algorithm": "kmeans", "params": {"num_clusters": 4, "seed": null, "color_weight": null}}"#)
                .unwrap();
        assert_eq!(spec.params.get("seed"), Some(&ParamValue::Null));
        assert_eq!(spec.params.seed("kmeans", "seed").unwrap(), None);
        assert_eq!(spec.params.float("kmeans", "color_weight").unwrap(), None);
        assert_eq!(spec.params.text("seed"), None);
        assert!(spec.params.ensure_known("kmeans", &["num_clusters", "seed", "color_weight"]).is_ok());
    }

    #[test]
    fn unknown_keys_are_reported() {
        let params = ParamMap::new().with("cel_size", 3i64);
        assert!(matches!(
            params.ensure_known("grid", &["cell_size"]),
            Err(PbnError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn json_values_deserialize_untagged() {
        let spec: StageSpec =
            serde_json::from_str(r#"{"algorithm": "smooth", "params": {"iterations": 2, "kernel_shape": "square", "x": 1.5}}"#)
                .unwrap();
        assert_eq!(spec.params.get("iterations"), Some(&ParamValue::Int(2)));
        assert_eq!(spec.params.text("kernel_shape").as_deref(), Some("square"));
        assert_eq!(spec.params.get("x"), Some(&ParamValue::Float(1.5)));
    }
}
