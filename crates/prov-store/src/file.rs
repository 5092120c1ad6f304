use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use prov_core::errors::{ErrorInfo, ProvError};
use prov_record::{validate_label, Record};

use crate::store::{duplicate, not_found, sort_records, Annotations, RecordStore};

const BACKEND: &str = "file";
const RECORDS_DIR: &str = "records";
const ANNOTATIONS_DIR: &str = "annotations";

/// One JSON document per record under a directory.
///
/// ```text
/// <root>/records/<label>.json
/// <root>/annotations/<label>.json
/// ```
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

fn io_error(code: &str, path: &Path, err: io::Error) -> ProvError {
    ProvError::Store(
        ErrorInfo::new(code, err.to_string())
            .with_context("backend", BACKEND)
            .with_context("path", path.display().to_string()),
    )
}

impl FileRecordStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ProvError> {
        let root = root.into();
        for dir in [RECORDS_DIR, ANNOTATIONS_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|err| io_error("store_create_dir", &path, err))?;
        }
        tracing::debug!(path = %root.display(), "opened file record store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, label: &str) -> Result<PathBuf, ProvError> {
        validate_label(label)?;
        Ok(self.root.join(RECORDS_DIR).join(format!("{label}.json")))
    }

    fn annotations_path(&self, label: &str) -> Result<PathBuf, ProvError> {
        validate_label(label)?;
        Ok(self.root.join(ANNOTATIONS_DIR).join(format!("{label}.json")))
    }

    fn require(&self, label: &str) -> Result<(), ProvError> {
        if self.record_path(label)?.is_file() {
            Ok(())
        } else {
            Err(not_found(BACKEND, label))
        }
    }

    fn read_record(&self, path: &Path) -> Result<Record, ProvError> {
        let bytes = fs::read(path).map_err(|err| io_error("record_read", path, err))?;
        Record::from_json_slice(&bytes).map_err(|err| err.with_context("path", path.display().to_string()))
    }
}

fn remove_if_present(path: &Path) -> Result<(), ProvError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error("store_delete", path, err)),
    }
}

impl RecordStore for FileRecordStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn save(&mut self, record: &Record) -> Result<(), ProvError> {
        let path = self.record_path(record.label())?;
        let bytes = record.to_json_pretty()?;
        // create_new makes the label check and the write a single step.
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(duplicate(BACKEND, record.label()));
            }
            Err(err) => return Err(io_error("record_write", &path, err)),
        };
        let written = file
            .write_all(bytes.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.sync_all());
        if let Err(err) = written {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(io_error("record_write", &path, err));
        }
        tracing::debug!(label = record.label(), "saved record");
        Ok(())
    }

    fn get(&self, label: &str) -> Result<Record, ProvError> {
        let path = self.record_path(label)?;
        if !path.is_file() {
            return Err(not_found(BACKEND, label));
        }
        self.read_record(&path)
    }

    fn list(&self) -> Result<Vec<Record>, ProvError> {
        let dir = self.root.join(RECORDS_DIR);
        let entries = fs::read_dir(&dir).map_err(|err| io_error("store_list", &dir, err))?;
        let mut records = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| io_error("store_list", &dir, err))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            records.push(self.read_record(&path)?);
        }
        sort_records(&mut records);
        Ok(records)
    }

    fn delete(&mut self, label: &str) -> Result<(), ProvError> {
        let path = self.record_path(label)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(not_found(BACKEND, label)),
            Err(err) => return Err(io_error("store_delete", &path, err)),
        }
        remove_if_present(&self.annotations_path(label)?)?;
        tracing::debug!(label, "deleted record");
        Ok(())
    }

    fn annotations(&self, label: &str) -> Result<Annotations, ProvError> {
        self.require(label)?;
        let path = self.annotations_path(label)?;
        match fs::read(&path) {
            Ok(bytes) => prov_core::from_json_slice(&bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Annotations::default()),
            Err(err) => Err(io_error("annotations_read", &path, err)),
        }
    }

    fn set_annotations(&mut self, label: &str, annotations: &Annotations) -> Result<(), ProvError> {
        self.require(label)?;
        let path = self.annotations_path(label)?;
        if annotations.is_empty() {
            return remove_if_present(&path);
        }
        let bytes = prov_core::to_canonical_json_bytes(annotations)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|err| io_error("annotations_write", &tmp, err))?;
        fs::rename(&tmp, &path).map_err(|err| io_error("annotations_write", &path, err))
    }
}
