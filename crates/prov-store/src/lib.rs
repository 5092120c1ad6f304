//! Record stores for prov: a SQLite database or a directory of JSON files,
//! behind the [`RecordStore`] trait.

pub mod exchange;
pub mod file;
pub mod sqlite;
pub mod store;

use std::path::Path;

use prov_core::errors::ProvError;

pub use exchange::{
    export_bundle, export_json, import_bundle, import_json, sync, ExportBundle, ExportedRecord, ImportSummary,
    SyncReport,
};
pub use file::FileRecordStore;
pub use sqlite::SqliteRecordStore;
pub use store::{Annotations, RecordStore, LAST_LABEL};

/// Opens a store, choosing the backend from the path: `.db`, `.sqlite` and
/// `.sqlite3` files are SQLite databases, anything else is a directory store.
pub fn open_store(path: &Path) -> Result<Box<dyn RecordStore>, ProvError> {
    let sqlite = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("db" | "sqlite" | "sqlite3")
    );
    if sqlite {
        Ok(Box::new(SqliteRecordStore::open(path)?))
    } else {
        Ok(Box::new(FileRecordStore::open(path)?))
    }
}
