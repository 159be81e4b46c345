//! Local durable feedback log backed by SQLite.
//!
//! Each submission is a single parameterized `INSERT`, so appends are atomic
//! and concurrent submitters cannot lose each other's rows.

use std::path::Path;

use rusqlite::{Connection, params};

use super::{AccuracyRating, FeedbackError, FeedbackRecord, FeedbackStore, UsabilityRating};

/// Default filename for the feedback database under the app root.
pub const DB_FILE_NAME: &str = "feedback.db";

/// SQLite-backed append-only feedback log.
pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    /// Open (or create) the feedback database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FeedbackError> {
        let connection = Connection::open(path.as_ref())?;
        let store = Self { connection };
        store.apply_pragmas()?;
        store.apply_schema()?;
        Ok(store)
    }

    fn apply_pragmas(&self) -> Result<(), FeedbackError> {
        self.connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout=5000;",
        )?;
        Ok(())
    }

    fn apply_schema(&self) -> Result<(), FeedbackError> {
        self.connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                usability TEXT NOT NULL,
                accuracy TEXT NOT NULL,
                suggestion TEXT NOT NULL DEFAULT ''
            );",
        )?;
        Ok(())
    }
}

impl FeedbackStore for SqliteStore {
    fn append(&mut self, record: &FeedbackRecord) -> Result<(), FeedbackError> {
        record.validate()?;
        let mut stmt = self.connection.prepare_cached(
            "INSERT INTO feedback (name, usability, accuracy, suggestion)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![
            record.name,
            record.usability.as_str(),
            record.accuracy.as_str(),
            record.suggestion,
        ])?;
        Ok(())
    }

    fn records(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        let mut stmt = self.connection.prepare_cached(
            "SELECT name, usability, accuracy, suggestion FROM feedback ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut records = Vec::new();
        for row in rows {
            let (name, usability, accuracy, suggestion) = row?;
            let usability = UsabilityRating::parse(&usability)
                .ok_or(FeedbackError::InvalidRating(usability))?;
            let accuracy =
                AccuracyRating::parse(&accuracy).ok_or(FeedbackError::InvalidRating(accuracy))?;
            records.push(FeedbackRecord {
                name,
                usability,
                accuracy,
                suggestion,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::super::sample_record;
    use super::*;

    #[test]
    fn append_and_read_back_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path().join(DB_FILE_NAME)).unwrap();
        store.append(&sample_record("Ada")).unwrap();
        store.append(&sample_record("Grace")).unwrap();

        let rows = store.records().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], sample_record("Ada"));
        assert_eq!(rows[1].name, "Grace");
    }

    #[test]
    fn reopened_database_retains_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE_NAME);
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.append(&sample_record("Ada")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.records().unwrap().len(), 1);
    }

    #[test]
    fn empty_name_never_reaches_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path().join(DB_FILE_NAME)).unwrap();
        let mut record = sample_record("Ada");
        record.name = String::new();
        assert!(store.append(&record).is_err());
        assert!(store.records().unwrap().is_empty());
    }
}
