use std::collections::BTreeSet;

use prov_core::errors::{ErrorInfo, ProvError};
use prov_record::Record;
use serde::{Deserialize, Serialize};

/// Label alias for the most recent record.
pub const LAST_LABEL: &str = "last";

/// Post-hoc notes attached to a record without touching the sealed record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.outcome.is_none()
    }
}

/// Persistent collection of sealed records keyed by label.
///
/// Implementations verify record digests on load and never overwrite an
/// existing label.
pub trait RecordStore {
    /// Short backend name for diagnostics.
    fn backend(&self) -> &'static str;

    /// Stores a new record; `DuplicateLabel` if the label is taken.
    fn save(&mut self, record: &Record) -> Result<(), ProvError>;

    /// Loads one record; `NotFound` if absent.
    fn get(&self, label: &str) -> Result<Record, ProvError>;

    /// Every record ordered by timestamp, then label.
    fn list(&self) -> Result<Vec<Record>, ProvError>;

    /// Removes a record and its annotations; `NotFound` if absent.
    fn delete(&mut self, label: &str) -> Result<(), ProvError>;

    /// Annotations for an existing record.
    fn annotations(&self, label: &str) -> Result<Annotations, ProvError>;

    /// Replaces the annotations of an existing record.
    fn set_annotations(&mut self, label: &str, annotations: &Annotations) -> Result<(), ProvError>;

    fn contains(&self, label: &str) -> Result<bool, ProvError> {
        match self.get(label) {
            Ok(_) => Ok(true),
            Err(ProvError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn labels(&self) -> Result<Vec<String>, ProvError> {
        Ok(self
            .list()?
            .iter()
            .map(|record| record.label().to_string())
            .collect())
    }

    fn most_recent(&self) -> Result<Option<Record>, ProvError> {
        Ok(self.list()?.pop())
    }

    /// Maps the `last` alias to a concrete label.
    fn resolve_label(&self, label: &str) -> Result<String, ProvError> {
        if label != LAST_LABEL {
            return Ok(label.to_string());
        }
        self.most_recent()?
            .map(|record| record.label().to_string())
            .ok_or_else(|| {
                ProvError::NotFound(
                    ErrorInfo::new("store_empty", "the record store has no records")
                        .with_context("label", LAST_LABEL),
                )
            })
    }

    fn add_tag(&mut self, label: &str, tag: &str) -> Result<(), ProvError> {
        let tag = clean_tag(tag)?;
        let mut annotations = self.annotations(label)?;
        if annotations.tags.insert(tag) {
            self.set_annotations(label, &annotations)?;
        }
        Ok(())
    }

    fn remove_tag(&mut self, label: &str, tag: &str) -> Result<(), ProvError> {
        let mut annotations = self.annotations(label)?;
        if annotations.tags.remove(tag.trim()) {
            self.set_annotations(label, &annotations)?;
        }
        Ok(())
    }

    fn set_outcome(&mut self, label: &str, outcome: &str) -> Result<(), ProvError> {
        let mut annotations = self.annotations(label)?;
        let outcome = outcome.trim();
        annotations.outcome = if outcome.is_empty() {
            None
        } else {
            Some(outcome.to_string())
        };
        self.set_annotations(label, &annotations)
    }

    /// Labels of records carrying `tag`, in list order.
    fn labels_with_tag(&self, tag: &str) -> Result<Vec<String>, ProvError> {
        let mut labels = Vec::new();
        for label in self.labels()? {
            if self.annotations(&label)?.tags.contains(tag) {
                labels.push(label);
            }
        }
        Ok(labels)
    }
}

fn clean_tag(tag: &str) -> Result<String, ProvError> {
    let tag = tag.trim();
    if tag.is_empty() || tag.contains(char::is_whitespace) {
        return Err(ProvError::Config(
            ErrorInfo::new("invalid_tag", "tags must be non-empty and contain no whitespace")
                .with_context("tag", tag.to_string()),
        ));
    }
    Ok(tag.to_string())
}

pub(crate) fn not_found(backend: &str, label: &str) -> ProvError {
    ProvError::NotFound(
        ErrorInfo::new("record_not_found", format!("no record labelled '{label}'"))
            .with_context("label", label.to_string())
            .with_context("backend", backend.to_string()),
    )
}

pub(crate) fn duplicate(backend: &str, label: &str) -> ProvError {
    ProvError::DuplicateLabel(
        ErrorInfo::new("duplicate_label", format!("a record labelled '{label}' already exists"))
            .with_context("label", label.to_string())
            .with_context("backend", backend.to_string())
            .with_hint("choose another label or delete the existing record"),
    )
}

/// Sorts records by timestamp, then label.
pub(crate) fn sort_records(records: &mut [Record]) {
    records.sort_by(|a, b| {
        a.timestamp()
            .cmp(&b.timestamp())
            .then_with(|| a.label().cmp(b.label()))
    });
}
