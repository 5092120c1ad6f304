//! Dimension-by-dimension comparison of two records.
//!
//! The comparator reports what diverged and leaves it to the caller to decide
//! whether a divergence matters.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use prov_core::errors::{ErrorInfo, ProvError};
use prov_core::{CodeIdentity, WhitespacePolicy};
use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::data::DataKey;
use crate::params::LABEL_PARAMETER;
use crate::record::Record;

/// Aspect of a record compared independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    CodeIdentity,
    Dependencies,
    Parameters,
    Outputs,
    Inputs,
    Command,
    Environment,
    ExitStatus,
}

impl Dimension {
    /// Every dimension, in report order.
    pub const ALL: [Dimension; 8] = [
        Dimension::CodeIdentity,
        Dimension::Dependencies,
        Dimension::Parameters,
        Dimension::Outputs,
        Dimension::Inputs,
        Dimension::Command,
        Dimension::Environment,
        Dimension::ExitStatus,
    ];

    /// The four dimensions that decide whether a run reproduced.
    pub const CORE: [Dimension; 4] = [
        Dimension::CodeIdentity,
        Dimension::Dependencies,
        Dimension::Parameters,
        Dimension::Outputs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::CodeIdentity => "code_identity",
            Dimension::Dependencies => "dependencies",
            Dimension::Parameters => "parameters",
            Dimension::Outputs => "outputs",
            Dimension::Inputs => "inputs",
            Dimension::Command => "command",
            Dimension::Environment => "environment",
            Dimension::ExitStatus => "exit_status",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = ProvError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().replace('-', "_").to_ascii_lowercase();
        Dimension::ALL
            .into_iter()
            .find(|dimension| dimension.as_str() == wanted)
            .ok_or_else(|| {
                ProvError::Config(
                    ErrorInfo::new("unknown_dimension", format!("unknown comparison dimension '{value}'"))
                        .with_hint("expected one of code_identity, dependencies, parameters, outputs, inputs, command, environment, exit_status"),
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionStatus {
    Identical,
    Differs,
}

/// How a key differs between the left and right record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Only present in the right record.
    Added,
    /// Only present in the left record.
    Removed,
    Changed,
}

/// One differing key with rendered left and right values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    pub key: String,
    pub kind: ChangeKind,
    pub left: Option<String>,
    pub right: Option<String>,
}

impl Difference {
    fn changed(key: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: ChangeKind::Changed,
            left: Some(left.into()),
            right: Some(right.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionReport {
    pub dimension: Dimension,
    pub status: DimensionStatus,
    pub differences: Vec<Difference>,
}

impl DimensionReport {
    fn from_differences(dimension: Dimension, differences: Vec<Difference>) -> Self {
        let status = if differences.is_empty() {
            DimensionStatus::Identical
        } else {
            DimensionStatus::Differs
        };
        Self {
            dimension,
            status,
            differences,
        }
    }

    pub fn is_identical(&self) -> bool {
        self.status == DimensionStatus::Identical
    }

    pub fn differing_keys(&self) -> Vec<&str> {
        self.differences.iter().map(|diff| diff.key.as_str()).collect()
    }
}

/// Per-dimension comparison of two records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub left: String,
    pub right: String,
    pub dimensions: Vec<DimensionReport>,
}

impl ComparisonReport {
    /// True when every compared dimension is identical.
    pub fn is_identical(&self) -> bool {
        self.dimensions.iter().all(DimensionReport::is_identical)
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionReport> {
        self.dimensions.iter().find(|report| report.dimension == dimension)
    }

    pub fn differing(&self) -> impl Iterator<Item = &DimensionReport> {
        self.dimensions.iter().filter(|report| !report.is_identical())
    }
}

/// Settings for [`RecordComparator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareOptions {
    #[serde(default)]
    pub whitespace: WhitespacePolicy,
    /// Regular expressions over output paths excluded from the outputs
    /// dimension. A pattern matching anywhere in the path excludes it.
    #[serde(default)]
    pub ignore_outputs: Vec<String>,
    #[serde(default = "default_dimensions")]
    pub dimensions: Vec<Dimension>,
}

fn default_dimensions() -> Vec<Dimension> {
    Dimension::ALL.to_vec()
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            whitespace: WhitespacePolicy::default(),
            ignore_outputs: Vec::new(),
            dimensions: default_dimensions(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordComparator {
    options: CompareOptions,
    ignore_outputs: RegexSet,
}

impl Default for RecordComparator {
    fn default() -> Self {
        Self {
            options: CompareOptions::default(),
            ignore_outputs: RegexSet::empty(),
        }
    }
}

impl RecordComparator {
    pub fn new(options: CompareOptions) -> Result<Self, ProvError> {
        let ignore_outputs = RegexSet::new(&options.ignore_outputs).map_err(|err| {
            ProvError::Config(
                ErrorInfo::new("output_ignore_pattern", err.to_string())
                    .with_context("patterns", options.ignore_outputs.join(", ")),
            )
        })?;
        Ok(Self {
            options,
            ignore_outputs,
        })
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    pub fn compare(&self, left: &Record, right: &Record) -> ComparisonReport {
        let mut seen = BTreeSet::new();
        let dimensions = self
            .options
            .dimensions
            .iter()
            .filter(|dimension| seen.insert(**dimension))
            .map(|dimension| {
                let differences = match dimension {
                    Dimension::CodeIdentity => self.code_identity(left.code_identity(), right.code_identity()),
                    Dimension::Dependencies => dependencies(left, right),
                    Dimension::Parameters => parameters(left, right),
                    Dimension::Outputs => self.data(left.outputs(), right.outputs(), true),
                    Dimension::Inputs => self.data(left.input_data(), right.input_data(), false),
                    Dimension::Command => command(left, right),
                    Dimension::Environment => keyed(
                        left.environment().fields(),
                        right.environment().fields(),
                    ),
                    Dimension::ExitStatus => exit_status(left, right),
                };
                DimensionReport::from_differences(*dimension, differences)
            })
            .collect();
        ComparisonReport {
            left: left.label().to_string(),
            right: right.label().to_string(),
            dimensions,
        }
    }

    fn code_identity(&self, left: &CodeIdentity, right: &CodeIdentity) -> Vec<Difference> {
        let mut differences = Vec::new();
        if left.vcs_type() != right.vcs_type() {
            differences.push(Difference::changed(
                "vcs_type",
                left.vcs_type().as_str(),
                right.vcs_type().as_str(),
            ));
        }
        if left.revision_id() != right.revision_id() {
            differences.push(Difference::changed(
                "revision_id",
                left.revision_id().unwrap_or("-"),
                right.revision_id().unwrap_or("-"),
            ));
        }
        let policy = self.options.whitespace;
        let left_diff = policy.normalize(left.working_copy_diff());
        let right_diff = policy.normalize(right.working_copy_diff());
        if left_diff != right_diff {
            differences.push(Difference::changed(
                "working_copy_diff",
                describe_diff(left.working_copy_diff(), policy),
                describe_diff(right.working_copy_diff(), policy),
            ));
        }
        differences
    }

    fn data(&self, left: &[DataKey], right: &[DataKey], apply_ignore: bool) -> Vec<Difference> {
        let index = |keys: &[DataKey]| -> BTreeMap<String, String> {
            keys.iter()
                .filter(|key| !(apply_ignore && self.ignore_outputs.is_match(&key.path)))
                .map(|key| (key.path.clone(), key.sha256.clone()))
                .collect()
        };
        let left = index(left);
        let right = index(right);
        keyed_with(left, right, |hash| short_hash(hash).to_string())
    }
}

fn describe_diff(diff: &str, policy: WhitespacePolicy) -> String {
    if diff.is_empty() {
        return "clean".to_string();
    }
    if policy.treats_as_clean(diff) {
        return "whitespace-only changes".to_string();
    }
    let changed = diff
        .lines()
        .filter(|line| {
            (line.starts_with('+') && !line.starts_with("+++"))
                || (line.starts_with('-') && !line.starts_with("---"))
        })
        .count();
    format!(
        "dirty ({changed} changed lines, {})",
        short_hash(&prov_core::sha256_hex(diff.as_bytes()))
    )
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

fn dependencies(left: &Record, right: &Record) -> Vec<Difference> {
    let index = |record: &Record| -> BTreeMap<String, String> {
        record
            .dependencies()
            .iter()
            .map(|dep| (dep.name.clone(), dep.version.clone()))
            .collect()
    };
    keyed(index(left), index(right))
}

fn parameters(left: &Record, right: &Record) -> Vec<Difference> {
    let flat = |record: &Record| {
        let mut parameters = record.parameters().clone();
        parameters.remove(LABEL_PARAMETER);
        parameters.flatten()
    };
    let (left, right) = (flat(left), flat(right));
    let mut differences = Vec::new();
    let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
    for key in keys {
        match (left.get(key), right.get(key)) {
            (Some(l), Some(r)) if l == r => {}
            (Some(l), Some(r)) => differences.push(Difference::changed(key.clone(), l.to_string(), r.to_string())),
            (Some(l), None) => differences.push(Difference {
                key: key.clone(),
                kind: ChangeKind::Removed,
                left: Some(l.to_string()),
                right: None,
            }),
            (None, Some(r)) => differences.push(Difference {
                key: key.clone(),
                kind: ChangeKind::Added,
                left: None,
                right: Some(r.to_string()),
            }),
            (None, None) => {}
        }
    }
    differences
}

fn command(left: &Record, right: &Record) -> Vec<Difference> {
    let fields = |record: &Record| -> BTreeMap<String, String> {
        let command = record.command();
        let mut map = BTreeMap::from([
            ("executable".to_string(), command.executable.clone()),
            ("arguments".to_string(), command.arguments.join(" ")),
        ]);
        if let Some(main_file) = &command.main_file {
            map.insert("main_file".to_string(), main_file.clone());
        }
        map
    };
    keyed(fields(left), fields(right))
}

fn exit_status(left: &Record, right: &Record) -> Vec<Difference> {
    if left.exit_status() == right.exit_status() {
        return Vec::new();
    }
    vec![Difference::changed(
        "exit_status",
        left.exit_status().to_string(),
        right.exit_status().to_string(),
    )]
}

fn keyed(left: BTreeMap<String, String>, right: BTreeMap<String, String>) -> Vec<Difference> {
    keyed_with(left, right, |value| value.to_string())
}

fn keyed_with(
    left: BTreeMap<String, String>,
    right: BTreeMap<String, String>,
    render: impl Fn(&str) -> String,
) -> Vec<Difference> {
    let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
    let mut differences = Vec::new();
    for key in keys {
        let difference = match (left.get(key), right.get(key)) {
            (Some(l), Some(r)) if l == r => continue,
            (Some(l), Some(r)) => Difference::changed(key.clone(), render(l), render(r)),
            (Some(l), None) => Difference {
                key: key.clone(),
                kind: ChangeKind::Removed,
                left: Some(render(l)),
                right: None,
            },
            (None, Some(r)) => Difference {
                key: key.clone(),
                kind: ChangeKind::Added,
                left: None,
                right: Some(render(r)),
            },
            (None, None) => continue,
        };
        differences.push(difference);
    }
    differences
}
