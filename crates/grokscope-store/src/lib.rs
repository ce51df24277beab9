use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use grokscope_core::{Annotation, is_empty_annotation, join_tags, normalize_tags, parse_tags};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

mod path;

pub use path::canonical_path;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("annotation store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),
    #[error("cannot resolve path {path}: {source}")]
    PathUnresolvable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line numbers start at 1, got {0}")]
    InvalidLine(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Deleted,
    Unchanged,
}

impl UpsertOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Unchanged => "unchanged",
        }
    }
}

pub trait AnnotationStore {
    /// All annotations recorded for `file`, in line order.
    fn get(&self, file: &Path) -> Result<Vec<Annotation>, StoreError>;

    /// Creates, updates or deletes the annotation at `file:line` in one transaction.
    ///
    /// An empty note with no tags removes the record; it is never stored empty.
    fn upsert(
        &self,
        file: &Path,
        line: usize,
        note: &str,
        tags: &[String],
    ) -> Result<UpsertOutcome, StoreError>;
}

/// SQLite-backed store. Each call opens its own connection and closes it on return.
#[derive(Debug, Clone)]
pub struct SqliteAnnotationStore {
    db_path: PathBuf,
}

impl SqliteAnnotationStore {
    /// Opens (creating if needed) the database at `db_path` and initializes its schema.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let store = Self { db_path };
        let conn = store.connect()?;
        run_migrations(&conn)?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }
}

impl AnnotationStore for SqliteAnnotationStore {
    fn get(&self, file: &Path) -> Result<Vec<Annotation>, StoreError> {
        let file = canonical_path(file)?;
        let conn = self.connect()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT file, line, annotation, tags
            FROM annotations
            WHERE file = ?1
            ORDER BY line
            "#,
        )?;

        let rows = stmt.query_map(params![file], |row| {
            let line: i64 = row.get(1)?;
            let line = usize::try_from(line)
                .ok()
                .filter(|line| *line > 0)
                .ok_or(rusqlite::Error::IntegralValueOutOfRange(1, line))?;
            let tags: String = row.get(3)?;
            Ok(Annotation {
                file: row.get(0)?,
                line,
                note: row.get(2)?,
                tags: parse_tags(&tags),
            })
        })?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn upsert(
        &self,
        file: &Path,
        line: usize,
        note: &str,
        tags: &[String],
    ) -> Result<UpsertOutcome, StoreError> {
        let line_value = i64::try_from(line)
            .ok()
            .filter(|value| *value > 0)
            .ok_or(StoreError::InvalidLine(line))?;
        let file = canonical_path(file)?;
        let tags = normalize_tags(tags);

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT rowid FROM annotations WHERE file = ?1 AND line = ?2",
                params![file, line_value],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match (existing, is_empty_annotation(note, &tags)) {
            (None, true) => UpsertOutcome::Unchanged,
            (Some(rowid), true) => {
                tx.execute("DELETE FROM annotations WHERE rowid = ?1", params![rowid])?;
                UpsertOutcome::Deleted
            }
            (Some(rowid), false) => {
                tx.execute(
                    "UPDATE annotations SET annotation = ?1, tags = ?2 WHERE rowid = ?3",
                    params![note, join_tags(&tags), rowid],
                )?;
                UpsertOutcome::Updated
            }
            (None, false) => {
                tx.execute(
                    r#"
                    INSERT INTO annotations (file, line, annotation, tags)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![file, line_value, note, join_tags(&tags)],
                )?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit()?;
        tracing::debug!(file = %file, line, outcome = outcome.as_str(), "annotation upsert committed");

        Ok(outcome)
    }
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS annotations (
            file TEXT NOT NULL,
            line INTEGER NOT NULL,
            annotation TEXT NOT NULL,
            tags TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS annotations_file_line
            ON annotations (file, line);
        "#,
    )?;

    Ok(())
}
