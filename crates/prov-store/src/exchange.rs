//! Moving records between stores: JSON export/import and two-way sync.

use std::fs;
use std::path::Path;

use prov_core::errors::{ErrorInfo, ProvError};
use prov_core::SchemaVersion;
use prov_record::Record;
use serde::{Deserialize, Serialize};

use crate::store::{Annotations, RecordStore};

/// A record together with its store-side annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedRecord {
    pub record: Record,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

/// On-disk document written by [`export_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub schema_version: SchemaVersion,
    pub records: Vec<ExportedRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: Vec<String>,
    /// Already present with the same digest.
    pub unchanged: Vec<String>,
    /// Present with a different digest; left untouched.
    pub collisions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub copied_to_left: Vec<String>,
    pub copied_to_right: Vec<String>,
    pub collisions: Vec<String>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.copied_to_left.is_empty() && self.copied_to_right.is_empty() && self.collisions.is_empty()
    }
}

pub fn export_bundle(store: &dyn RecordStore) -> Result<ExportBundle, ProvError> {
    let mut records = Vec::new();
    for record in store.list()? {
        let annotations = store.annotations(record.label())?;
        records.push(ExportedRecord { record, annotations });
    }
    Ok(ExportBundle {
        schema_version: SchemaVersion::CURRENT,
        records,
    })
}

/// Writes every record and its annotations to `path`; returns the count.
pub fn export_json(store: &dyn RecordStore, path: &Path) -> Result<usize, ProvError> {
    let bundle = export_bundle(store)?;
    let text = prov_core::to_canonical_json_pretty(&bundle)?;
    fs::write(path, text).map_err(|err| {
        ProvError::Store(
            ErrorInfo::new("export_write", err.to_string()).with_context("path", path.display().to_string()),
        )
    })?;
    tracing::info!(count = bundle.records.len(), path = %path.display(), "exported records");
    Ok(bundle.records.len())
}

/// Adds every record of the bundle that the store does not have yet.
pub fn import_bundle(store: &mut dyn RecordStore, bundle: ExportBundle) -> Result<ImportSummary, ProvError> {
    if !bundle.schema_version.is_compatible_with(&SchemaVersion::CURRENT) {
        return Err(ProvError::Serde(
            ErrorInfo::new("schema_version", "export bundle schema is not supported")
                .with_context("found", bundle.schema_version.to_string())
                .with_context("supported", SchemaVersion::CURRENT.to_string()),
        ));
    }
    let mut summary = ImportSummary::default();
    for entry in bundle.records {
        entry.record.verify_digest()?;
        let label = entry.record.label().to_string();
        match store.get(&label) {
            Ok(existing) if existing.digest() == entry.record.digest() => {
                summary.unchanged.push(label);
            }
            Ok(_) => {
                tracing::warn!(label = %label, "import collision: label exists with different content");
                summary.collisions.push(label);
            }
            Err(ProvError::NotFound(_)) => {
                store.save(&entry.record)?;
                if !entry.annotations.is_empty() {
                    store.set_annotations(&label, &entry.annotations)?;
                }
                summary.imported.push(label);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(summary)
}

pub fn import_json(store: &mut dyn RecordStore, path: &Path) -> Result<ImportSummary, ProvError> {
    let bytes = fs::read(path).map_err(|err| {
        ProvError::Store(
            ErrorInfo::new("import_read", err.to_string()).with_context("path", path.display().to_string()),
        )
    })?;
    let bundle: ExportBundle =
        prov_core::from_json_slice(&bytes).map_err(|err| err.with_context("path", path.display().to_string()))?;
    import_bundle(store, bundle)
}

fn copy_record(from: &dyn RecordStore, to: &mut dyn RecordStore, record: &Record) -> Result<(), ProvError> {
    to.save(record)?;
    let annotations = from.annotations(record.label())?;
    if !annotations.is_empty() {
        to.set_annotations(record.label(), &annotations)?;
    }
    Ok(())
}

/// Copies records missing on either side. Labels present on both sides with
/// different digests are reported and left alone.
pub fn sync(left: &mut dyn RecordStore, right: &mut dyn RecordStore) -> Result<SyncReport, ProvError> {
    let left_records = left.list()?;
    let right_records = right.list()?;
    let mut report = SyncReport::default();

    for record in &left_records {
        match right_records.iter().find(|other| other.label() == record.label()) {
            Some(other) if other.digest() != record.digest() => {
                report.collisions.push(record.label().to_string());
            }
            Some(_) => {}
            None => {
                copy_record(&*left, &mut *right, record)?;
                report.copied_to_right.push(record.label().to_string());
            }
        }
    }
    for record in &right_records {
        if left_records.iter().all(|other| other.label() != record.label()) {
            copy_record(&*right, &mut *left, record)?;
            report.copied_to_left.push(record.label().to_string());
        }
    }
    if !report.collisions.is_empty() {
        tracing::warn!(collisions = ?report.collisions, "sync left conflicting labels untouched");
    }
    Ok(report)
}
