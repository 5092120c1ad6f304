use std::fmt::Write as _;
use std::str::FromStr;

use prov_core::errors::ProvError;

use crate::compare::{ChangeKind, ComparisonReport};

/// Text rendering of a [`ComparisonReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffFormatter {
    /// One line per differing dimension.
    #[default]
    Short,
    /// Every differing key with left and right values.
    Long,
}

impl FromStr for DiffFormatter {
    type Err = ProvError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(DiffFormatter::Short),
            "long" => Ok(DiffFormatter::Long),
            other => Err(ProvError::config(
                "diff_format",
                format!("unknown diff format '{other}', expected short or long"),
            )),
        }
    }
}

impl DiffFormatter {
    pub fn render(&self, report: &ComparisonReport) -> String {
        let mut out = String::new();
        if report.is_identical() {
            let _ = writeln!(out, "Records {} and {} are identical.", report.left, report.right);
            return out;
        }
        let _ = writeln!(out, "Record 1: {}", report.left);
        let _ = writeln!(out, "Record 2: {}", report.right);
        for dimension in &report.dimensions {
            let marker = if dimension.is_identical() { "same" } else { "DIFFERS" };
            match self {
                DiffFormatter::Short => {
                    if dimension.is_identical() {
                        let _ = writeln!(out, "  {:<14} {marker}", dimension.dimension.as_str());
                    } else {
                        let _ = writeln!(
                            out,
                            "  {:<14} {marker}: {}",
                            dimension.dimension.as_str(),
                            dimension.differing_keys().join(", ")
                        );
                    }
                }
                DiffFormatter::Long => {
                    let _ = writeln!(out, "  {:<14} {marker}", dimension.dimension.as_str());
                    for diff in &dimension.differences {
                        let left = diff.left.as_deref().unwrap_or("(absent)");
                        let right = diff.right.as_deref().unwrap_or("(absent)");
                        let tag = match diff.kind {
                            ChangeKind::Added => "+",
                            ChangeKind::Removed => "-",
                            ChangeKind::Changed => "~",
                        };
                        let _ = writeln!(out, "    {tag} {}: {left} -> {right}", diff.key);
                    }
                }
            }
        }
        out
    }
}
