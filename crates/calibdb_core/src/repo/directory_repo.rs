//! Directory record supplier: the contract the directory cache consumes.
//!
//! # Responsibility
//! - Fetch the flat directory record list for tree rebuilds.
//! - Provide a cheap change signal so rebuilds only run on drift.
//!
//! # Invariants
//! - Records carry no paths; the cache derives `full_path` while linking.
//! - Equal change signals mean the directory set is unchanged.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::directory::DbKey;
use rusqlite::{Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type for directory source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors from directory record suppliers.
#[derive(Debug)]
pub enum SourceError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Transport-level failure of a non-SQLite supplier.
    Unavailable(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid directory record: {message}"),
            Self::Unavailable(message) => write!(f, "directory source unavailable: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "directory source requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SourceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SourceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One raw directory row as stored upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Database key, never 0.
    pub id: DbKey,
    /// Parent database key, 0 for top-level directories.
    pub parent_id: DbKey,
    /// Leaf name.
    pub name: String,
    /// Epoch ms creation timestamp.
    pub created_time: i64,
    /// Epoch ms last modification timestamp.
    pub modified_time: i64,
    /// Free-text description.
    pub comment: Option<String>,
}

/// Opaque comparable staleness token for the directory set.
///
/// Equality with the previously observed signal means no rebuild is
/// needed; any difference triggers one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSignal {
    pub directory_count: i64,
    pub last_modified: Option<i64>,
}

/// Supplier of directory records for the cache.
pub trait DirectorySource {
    /// Fetches every directory record, unordered.
    fn fetch_all(&self) -> SourceResult<Vec<DirectoryRecord>>;

    /// Fetches the current staleness token.
    fn fetch_change_signal(&self) -> SourceResult<ChangeSignal>;
}

/// SQLite-backed directory source.
pub struct SqliteDirectorySource<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectorySource<'conn> {
    /// Creates a source from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> SourceResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl DirectorySource for SqliteDirectorySource<'_> {
    fn fetch_all(&self) -> SourceResult<Vec<DirectoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, parentId, name, created, modified, comment
             FROM directories;",
        )?;

        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_directory_row(row)?);
        }
        Ok(records)
    }

    fn fetch_change_signal(&self) -> SourceResult<ChangeSignal> {
        let signal = self.conn.query_row(
            "SELECT COUNT(id), MAX(modified) FROM directories;",
            [],
            |row| {
                Ok(ChangeSignal {
                    directory_count: row.get(0)?,
                    last_modified: row.get(1)?,
                })
            },
        )?;
        Ok(signal)
    }
}

fn parse_directory_row(row: &Row<'_>) -> SourceResult<DirectoryRecord> {
    let id: DbKey = row.get("id")?;
    if id <= 0 {
        return Err(SourceError::InvalidData(format!(
            "invalid key `{id}` in directories.id"
        )));
    }

    Ok(DirectoryRecord {
        id,
        parent_id: row.get("parentId")?,
        name: row.get("name")?,
        created_time: row.get("created")?,
        modified_time: row.get("modified")?,
        comment: row.get("comment")?,
    })
}

fn ensure_connection_ready(conn: &Connection) -> SourceResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(SourceError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
