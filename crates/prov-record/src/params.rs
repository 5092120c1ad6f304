//! Typed run parameters loaded from JSON, YAML or TOML files and overridden
//! from the command line with `name=value` pairs.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use prov_core::errors::{ErrorInfo, ProvError};
use serde::{Deserialize, Serialize};

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Parses a command-line value: int, then float, then bool, then a
    /// bracketed list, else a string.
    pub fn parse_literal(text: &str) -> ParamValue {
        let text = text.trim();
        if let Ok(int) = text.parse::<i64>() {
            return ParamValue::Int(int);
        }
        if let Ok(float) = text.parse::<f64>() {
            if float.is_finite() {
                return ParamValue::Float(float);
            }
        }
        match text {
            "true" | "True" => return ParamValue::Bool(true),
            "false" | "False" => return ParamValue::Bool(false),
            _ => {}
        }
        if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            let items = split_list(inner);
            return ParamValue::List(items.iter().map(|item| ParamValue::parse_literal(item)).collect());
        }
        ParamValue::Str(unquote(text).to_string())
    }

    fn check_finite(&self, key: &str) -> Result<(), ProvError> {
        match self {
            ParamValue::Float(value) if !value.is_finite() => Err(ProvError::Parameters(
                ErrorInfo::new("non_finite", "parameter values must be finite numbers")
                    .with_context("key", key.to_string())
                    .with_context("value", value.to_string()),
            )),
            ParamValue::List(items) => items.iter().try_for_each(|item| item.check_finite(key)),
            ParamValue::Map(map) => map
                .iter()
                .try_for_each(|(child, value)| value.check_finite(&join_key(key, child))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Float(value) => write!(f, "{value:?}"),
            ParamValue::Str(value) => write!(f, "{value:?}"),
            ParamValue::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            ParamValue::Map(map) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
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
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

/// Splits a list body on top-level commas, respecting nested brackets and quotes.
fn split_list(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut current = String::new();
    for ch in inner.chars() {
        match (ch, quote) {
            ('\'' | '"', None) => quote = Some(ch),
            (c, Some(open)) if c == open => quote = None,
            ('[', None) => depth += 1,
            (']', None) => depth = depth.saturating_sub(1),
            (',', None) if depth == 0 => {
                items.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.trim().is_empty() || !items.is_empty() {
        items.push(current);
    }
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Top-level key under which a run's own label is passed in its parameter
/// file. Ignored when comparing records.
pub const LABEL_PARAMETER: &str = "prov_label";

/// Serialization used for a parameter file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamFormat {
    Json,
    Yaml,
    Toml,
}

impl ParamFormat {
    /// Format implied by the file extension, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Some(ParamFormat::Json),
            Some("yaml" | "yml") => Some(ParamFormat::Yaml),
            Some("toml") => Some(ParamFormat::Toml),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ParamFormat::Json => "json",
            ParamFormat::Yaml => "yaml",
            ParamFormat::Toml => "toml",
        }
    }
}

/// Named parameters of one run, compared by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, ParamValue>", into = "BTreeMap<String, ParamValue>")]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl TryFrom<BTreeMap<String, ParamValue>> for ParameterSet {
    type Error = ProvError;

    fn try_from(values: BTreeMap<String, ParamValue>) -> Result<Self, Self::Error> {
        for (key, value) in &values {
            value.check_finite(key)?;
        }
        Ok(Self { values })
    }
}

impl From<ParameterSet> for BTreeMap<String, ParamValue> {
    fn from(set: ParameterSet) -> Self {
        set.values
    }
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    /// Top-level value for `key`.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// Value at a dotted path such as `solver.tol`.
    pub fn lookup(&self, path: &str) -> Option<&ParamValue> {
        let mut parts = path.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            match current {
                ParamValue::Map(map) => current = map.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Inserts a top-level value, rejecting non-finite floats.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Result<(), ProvError> {
        let key = key.into();
        let value = value.into();
        value.check_finite(&key)?;
        self.values.insert(key, value);
        Ok(())
    }

    /// Removes a top-level value.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.values.remove(key)
    }

    /// Sets the value at a dotted path, creating intermediate maps.
    pub fn set_path(&mut self, path: &str, value: ParamValue) -> Result<(), ProvError> {
        value.check_finite(path)?;
        let parts: Vec<&str> = path.split('.').map(str::trim).collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(ProvError::Parameters(
                ErrorInfo::new("override_key", "parameter name has an empty component")
                    .with_context("key", path.to_string()),
            ));
        }
        let (last, parents) = match parts.split_last() {
            Some(split) => split,
            None => return Ok(()),
        };
        let mut current = &mut self.values;
        for (depth, part) in parents.iter().enumerate() {
            let entry = current
                .entry((*part).to_string())
                .or_insert_with(|| ParamValue::Map(BTreeMap::new()));
            current = match entry {
                ParamValue::Map(map) => map,
                _ => {
                    return Err(ProvError::Parameters(
                        ErrorInfo::new("override_path", "cannot descend into a non-map parameter")
                            .with_context("key", path.to_string())
                            .with_context("at", parts[..=depth].join(".")),
                    ))
                }
            };
        }
        current.insert((*last).to_string(), value);
        Ok(())
    }

    /// Applies one `name=value` override.
    pub fn apply_override(&mut self, assignment: &str) -> Result<(), ProvError> {
        let Some((name, value)) = assignment.split_once('=') else {
            return Err(ProvError::Parameters(
                ErrorInfo::new("override_syntax", "expected name=value")
                    .with_context("argument", assignment.to_string()),
            ));
        };
        self.set_path(name.trim(), ParamValue::parse_literal(value))
    }

    /// Applies overrides in order; later ones win.
    pub fn apply_overrides<S: AsRef<str>>(&mut self, assignments: &[S]) -> Result<(), ProvError> {
        assignments
            .iter()
            .try_for_each(|assignment| self.apply_override(assignment.as_ref()))
    }

    /// Leaf values keyed by dotted path. Empty maps count as leaves.
    ///
    /// Dots and backslashes inside a key are backslash-escaped, so the key
    /// `"a.b"` flattens to `a\.b` and never collides with the path `a.b`.
    pub fn flatten(&self) -> BTreeMap<String, ParamValue> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.values {
            flatten_into(&escape_segment(key), value, &mut out);
        }
        out
    }

    pub fn from_json_str(text: &str) -> Result<Self, ProvError> {
        serde_json::from_str(text).map_err(|err| parse_error("json", err))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ProvError> {
        serde_yaml::from_str(text).map_err(|err| parse_error("yaml", err))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ProvError> {
        toml::from_str(text).map_err(|err| parse_error("toml", err))
    }

    pub fn parse(text: &str, format: ParamFormat) -> Result<Self, ProvError> {
        match format {
            ParamFormat::Json => Self::from_json_str(text),
            ParamFormat::Yaml => Self::from_yaml_str(text),
            ParamFormat::Toml => Self::from_toml_str(text),
        }
    }

    /// Reads a parameter file. Unknown extensions try JSON, YAML, then TOML.
    pub fn load(path: &Path) -> Result<Self, ProvError> {
        let text = fs::read_to_string(path).map_err(|err| {
            ProvError::Parameters(
                ErrorInfo::new("parameter_file", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let with_path = |err: ProvError| err.with_context("path", path.display().to_string());
        if let Some(format) = ParamFormat::from_path(path) {
            return Self::parse(&text, format).map_err(with_path);
        }
        let mut last = None;
        for format in [ParamFormat::Json, ParamFormat::Yaml, ParamFormat::Toml] {
            match Self::parse(&text, format) {
                Ok(set) => return Ok(set),
                Err(err) => last = Some(err),
            }
        }
        Err(with_path(last.unwrap_or_else(|| {
            ProvError::parameters("parameter_format", "unrecognised parameter file")
        })))
    }

    pub fn to_json(&self) -> Result<String, ProvError> {
        serde_json::to_string_pretty(self).map_err(|err| ProvError::serde("json_serialize", err))
    }

    pub fn to_yaml(&self) -> Result<String, ProvError> {
        serde_yaml::to_string(self).map_err(|err| ProvError::serde("yaml_serialize", err))
    }

    pub fn to_toml(&self) -> Result<String, ProvError> {
        toml::to_string(self).map_err(|err| ProvError::serde("toml_serialize", err))
    }

    pub fn render(&self, format: ParamFormat) -> Result<String, ProvError> {
        match format {
            ParamFormat::Json => self.to_json(),
            ParamFormat::Yaml => self.to_yaml(),
            ParamFormat::Toml => self.to_toml(),
        }
    }
}

fn flatten_into(prefix: &str, value: &ParamValue, out: &mut BTreeMap<String, ParamValue>) {
    match value {
        ParamValue::Map(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(&format!("{prefix}.{}", escape_segment(key)), child, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf.clone());
        }
    }
}

fn escape_segment(key: &str) -> String {
    if !key.contains(['.', '\\']) {
        return key.to_string();
    }
    key.replace('\\', "\\\\").replace('.', "\\.")
}

fn parse_error(format: &str, err: impl ToString) -> ProvError {
    ProvError::Parameters(
        ErrorInfo::new("parameter_parse", err.to_string()).with_context("format", format.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_follow_int_float_bool_list_string_order() {
        assert_eq!(ParamValue::parse_literal("10"), ParamValue::Int(10));
        assert_eq!(ParamValue::parse_literal("1e-6"), ParamValue::Float(1e-6));
        assert_eq!(ParamValue::parse_literal("2.0"), ParamValue::Float(2.0));
        assert_eq!(ParamValue::parse_literal("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse_literal("nan"), ParamValue::Str("nan".into()));
        assert_eq!(
            ParamValue::parse_literal("[1, 2.5, 'a,b', [3]]"),
            ParamValue::List(vec![
                ParamValue::Int(1),
                ParamValue::Float(2.5),
                ParamValue::Str("a,b".into()),
                ParamValue::List(vec![ParamValue::Int(3)]),
            ])
        );
        assert_eq!(ParamValue::parse_literal("[]"), ParamValue::List(Vec::new()));
        assert_eq!(ParamValue::parse_literal("\"42\""), ParamValue::Str("42".into()));
        assert_eq!(ParamValue::parse_literal("euler"), ParamValue::Str("euler".into()));
    }

    #[test]
    fn float_display_keeps_decimal_point() {
        assert_eq!(ParamValue::Float(10.0).to_string(), "10.0");
        assert_eq!(ParamValue::Int(10).to_string(), "10");
    }
}
