use std::fs;
use std::path::{Path, PathBuf};

use prov_core::errors::{ErrorInfo, ProvError};
use prov_record::Record;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::store::{duplicate, not_found, Annotations, RecordStore};

pub const SCHEMA_VERSION: i64 = 1;

const BACKEND: &str = "sqlite";

/// Records in a single SQLite database.
#[derive(Debug)]
pub struct SqliteRecordStore {
    path: PathBuf,
    conn: Connection,
}

fn sql_error(code: &str, err: rusqlite::Error) -> ProvError {
    ProvError::Store(ErrorInfo::new(code, err.to_string()).with_context("backend", BACKEND))
}

/// Fixed-width UTC timestamp so text order equals time order.
fn sortable_timestamp(record: &Record) -> String {
    record
        .timestamp()
        .format("%Y-%m-%dT%H:%M:%S%.9fZ")
        .to_string()
}

impl SqliteRecordStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProvError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                ProvError::Store(
                    ErrorInfo::new("store_create_dir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let conn = Connection::open(&path).map_err(|err| {
            ProvError::Store(
                ErrorInfo::new("sqlite_open", "failed to open record database")
                    .with_context("path", path.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
        init_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened sqlite record store");
        Ok(Self { path, conn })
    }

    /// In-memory database, used by tests and dry runs.
    pub fn in_memory() -> Result<Self, ProvError> {
        let conn = Connection::open_in_memory().map_err(|err| sql_error("sqlite_open", err))?;
        init_schema(&conn)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn exists(&self, label: &str) -> Result<bool, ProvError> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM records WHERE label = ?1", params![label], |row| row.get(0))
            .optional()
            .map_err(|err| sql_error("sqlite_query", err))?;
        Ok(found.is_some())
    }

    fn decode(label: &str, body: &str) -> Result<Record, ProvError> {
        Record::from_json_slice(body.as_bytes()).map_err(|err| err.with_context("label", label.to_string()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), ProvError> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS meta(version INTEGER NOT NULL);
        CREATE TABLE IF NOT EXISTS records(
            label TEXT PRIMARY KEY NOT NULL,
            timestamp TEXT NOT NULL,
            digest TEXT NOT NULL,
            body TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS records_by_time ON records(timestamp, label);
        CREATE TABLE IF NOT EXISTS tags(
            label TEXT NOT NULL,
            tag TEXT NOT NULL,
            PRIMARY KEY(label, tag),
            FOREIGN KEY(label) REFERENCES records(label)
        );
        CREATE TABLE IF NOT EXISTS outcomes(
            label TEXT PRIMARY KEY NOT NULL,
            outcome TEXT NOT NULL,
            FOREIGN KEY(label) REFERENCES records(label)
        );
        COMMIT;",
    )
    .map_err(|err| sql_error("sqlite_schema", err))?;
    set_version(conn, SCHEMA_VERSION)
}

fn set_version(conn: &Connection, version: i64) -> Result<(), ProvError> {
    let existing: Option<i64> = conn
        .query_row("SELECT version FROM meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| sql_error("sqlite_schema", err))?;
    match existing {
        Some(current) if current == version => Ok(()),
        Some(current) => Err(ProvError::Store(
            ErrorInfo::new(
                "sqlite_schema_version",
                format!("record database schema {current} incompatible with expected {version}"),
            )
            .with_context("backend", BACKEND),
        )),
        None => {
            conn.execute("INSERT INTO meta(version) VALUES (?1)", params![version])
                .map_err(|err| sql_error("sqlite_schema", err))?;
            Ok(())
        }
    }
}

impl RecordStore for SqliteRecordStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn save(&mut self, record: &Record) -> Result<(), ProvError> {
        let body = String::from_utf8(record.to_json_bytes()?)
            .map_err(|err| ProvError::serde("record_utf8", err))?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| sql_error("sqlite_transaction", err))?;
        let taken: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM records WHERE label = ?1",
                params![record.label()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| sql_error("sqlite_query", err))?;
        if taken.is_some() {
            return Err(duplicate(BACKEND, record.label()));
        }
        tx.execute(
            "INSERT INTO records(label, timestamp, digest, body) VALUES (?1, ?2, ?3, ?4)",
            params![record.label(), sortable_timestamp(record), record.digest(), body],
        )
        .map_err(|err| sql_error("sqlite_insert", err))?;
        tx.commit().map_err(|err| sql_error("sqlite_commit", err))?;
        tracing::debug!(label = record.label(), "saved record");
        Ok(())
    }

    fn get(&self, label: &str) -> Result<Record, ProvError> {
        let body: Option<String> = self
            .conn
            .query_row("SELECT body FROM records WHERE label = ?1", params![label], |row| row.get(0))
            .optional()
            .map_err(|err| sql_error("sqlite_query", err))?;
        match body {
            Some(body) => Self::decode(label, &body),
            None => Err(not_found(BACKEND, label)),
        }
    }

    fn list(&self) -> Result<Vec<Record>, ProvError> {
        let mut stmt = self
            .conn
            .prepare("SELECT label, body FROM records ORDER BY timestamp, label")
            .map_err(|err| sql_error("sqlite_query", err))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|err| sql_error("sqlite_query", err))?;
        let mut records = Vec::new();
        for row in rows {
            let (label, body) = row.map_err(|err| sql_error("sqlite_row", err))?;
            records.push(Self::decode(&label, &body)?);
        }
        Ok(records)
    }

    fn delete(&mut self, label: &str) -> Result<(), ProvError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| sql_error("sqlite_transaction", err))?;
        tx.execute("DELETE FROM tags WHERE label = ?1", params![label])
            .map_err(|err| sql_error("sqlite_delete", err))?;
        tx.execute("DELETE FROM outcomes WHERE label = ?1", params![label])
            .map_err(|err| sql_error("sqlite_delete", err))?;
        let removed = tx
            .execute("DELETE FROM records WHERE label = ?1", params![label])
            .map_err(|err| sql_error("sqlite_delete", err))?;
        if removed == 0 {
            return Err(not_found(BACKEND, label));
        }
        tx.commit().map_err(|err| sql_error("sqlite_commit", err))?;
        tracing::debug!(label, "deleted record");
        Ok(())
    }

    fn annotations(&self, label: &str) -> Result<Annotations, ProvError> {
        if !self.exists(label)? {
            return Err(not_found(BACKEND, label));
        }
        let mut stmt = self
            .conn
            .prepare("SELECT tag FROM tags WHERE label = ?1 ORDER BY tag")
            .map_err(|err| sql_error("sqlite_query", err))?;
        let tags = stmt
            .query_map(params![label], |row| row.get::<_, String>(0))
            .map_err(|err| sql_error("sqlite_query", err))?
            .collect::<Result<_, _>>()
            .map_err(|err| sql_error("sqlite_row", err))?;
        let outcome: Option<String> = self
            .conn
            .query_row("SELECT outcome FROM outcomes WHERE label = ?1", params![label], |row| row.get(0))
            .optional()
            .map_err(|err| sql_error("sqlite_query", err))?;
        Ok(Annotations { tags, outcome })
    }

    fn set_annotations(&mut self, label: &str, annotations: &Annotations) -> Result<(), ProvError> {
        if !self.exists(label)? {
            return Err(not_found(BACKEND, label));
        }
        let tx = self
            .conn
            .transaction()
            .map_err(|err| sql_error("sqlite_transaction", err))?;
        tx.execute("DELETE FROM tags WHERE label = ?1", params![label])
            .map_err(|err| sql_error("sqlite_update", err))?;
        for tag in &annotations.tags {
            tx.execute("INSERT INTO tags(label, tag) VALUES (?1, ?2)", params![label, tag])
                .map_err(|err| sql_error("sqlite_update", err))?;
        }
        match &annotations.outcome {
            Some(outcome) => tx.execute(
                "INSERT INTO outcomes(label, outcome) VALUES (?1, ?2)
                 ON CONFLICT(label) DO UPDATE SET outcome = excluded.outcome",
                params![label, outcome],
            ),
            None => tx.execute("DELETE FROM outcomes WHERE label = ?1", params![label]),
        }
        .map_err(|err| sql_error("sqlite_update", err))?;
        tx.commit().map_err(|err| sql_error("sqlite_commit", err))
    }
}
