//! Constants read store: type tables, variations and assignments.
//!
//! # Responsibility
//! - Resolve type tables with their ordered column layout.
//! - Resolve variations for the parent-chain fallback lookup.
//! - Fetch the newest assignment covering one run.
//!
//! # Invariants
//! - Column order follows the schema's `columnOrder`; decoding depends
//!   on it.
//! - `latest_assignment` returns the highest assignment id among matches.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::assignment::Assignment;
use crate::model::directory::DbKey;
use crate::model::table::{ColumnType, TypeTable, TypeTableColumn};
use crate::model::variation::Variation;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type for constants store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the constants read store.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid constants data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "constants store requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Read interface for constants lookup.
pub trait AssignmentStore {
    /// Loads one type table by owning directory and name.
    fn type_table(&self, directory_id: DbKey, name: &str) -> StoreResult<Option<TypeTable>>;

    /// Loads one variation by unique name.
    fn variation_by_name(&self, name: &str) -> StoreResult<Option<Variation>>;

    /// Loads one variation by id; used when walking the parent chain.
    fn variation_by_id(&self, id: DbKey) -> StoreResult<Option<Variation>>;

    /// Loads the newest assignment of `type_table_id` under `variation_id`
    /// whose run range covers `run`.
    fn latest_assignment(
        &self,
        type_table_id: DbKey,
        run: i64,
        variation_id: DbKey,
    ) -> StoreResult<Option<Assignment>>;
}

/// SQLite-backed constants read store.
pub struct SqliteAssignmentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssignmentStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    fn load_columns(&self, type_table_id: DbKey) -> StoreResult<Vec<TypeTableColumn>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, columnType
             FROM columns
             WHERE typeId = ?1
             ORDER BY columnOrder ASC, id ASC;",
        )?;

        let mut rows = stmt.query([type_table_id])?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get("name")?;
            let type_text: String = row.get("columnType")?;
            let column_type = ColumnType::parse(&type_text).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "invalid column type `{type_text}` in columns.columnType"
                ))
            })?;
            columns.push(TypeTableColumn { name, column_type });
        }
        Ok(columns)
    }
}

impl AssignmentStore for SqliteAssignmentStore<'_> {
    fn type_table(&self, directory_id: DbKey, name: &str) -> StoreResult<Option<TypeTable>> {
        let header = self
            .conn
            .query_row(
                "SELECT id, directoryId, name, nRows, comment
                 FROM typeTables
                 WHERE directoryId = ?1
                   AND name = ?2;",
                params![directory_id, name],
                |row| {
                    Ok((
                        row.get::<_, DbKey>("id")?,
                        row.get::<_, DbKey>("directoryId")?,
                        row.get::<_, String>("name")?,
                        row.get::<_, i64>("nRows")?,
                        row.get::<_, Option<String>>("comment")?,
                    ))
                },
            )
            .optional()?;

        let Some((id, directory_id, name, rows_count, comment)) = header else {
            return Ok(None);
        };

        Ok(Some(TypeTable {
            id,
            directory_id,
            name,
            columns: self.load_columns(id)?,
            rows_count,
            comment,
        }))
    }

    fn variation_by_name(&self, name: &str) -> StoreResult<Option<Variation>> {
        self.conn
            .query_row(
                "SELECT id, parentId, name, comment
                 FROM variations
                 WHERE name = ?1;",
                [name],
                parse_variation_row,
            )
            .optional()
            .map_err(Into::into)
    }

    fn variation_by_id(&self, id: DbKey) -> StoreResult<Option<Variation>> {
        self.conn
            .query_row(
                "SELECT id, parentId, name, comment
                 FROM variations
                 WHERE id = ?1;",
                [id],
                parse_variation_row,
            )
            .optional()
            .map_err(Into::into)
    }

    fn latest_assignment(
        &self,
        type_table_id: DbKey,
        run: i64,
        variation_id: DbKey,
    ) -> StoreResult<Option<Assignment>> {
        self.conn
            .query_row(
                "SELECT
                    assignments.id AS id,
                    constantSets.constantTypeId AS typeTableId,
                    runRanges.runMin AS runMin,
                    runRanges.runMax AS runMax,
                    variations.name AS variationName,
                    assignments.created AS created,
                    assignments.modified AS modified,
                    assignments.comment AS comment,
                    constantSets.vault AS vault
                 FROM assignments
                 JOIN runRanges ON runRanges.id = assignments.runRangeId
                 JOIN variations ON variations.id = assignments.variationId
                 JOIN constantSets ON constantSets.id = assignments.constantSetId
                 WHERE constantSets.constantTypeId = ?1
                   AND assignments.variationId = ?2
                   AND runRanges.runMin <= ?3
                   AND runRanges.runMax >= ?3
                 ORDER BY assignments.id DESC
                 LIMIT 1;",
                params![type_table_id, variation_id, run],
                parse_assignment_row,
            )
            .optional()
            .map_err(Into::into)
    }
}

fn parse_variation_row(row: &Row<'_>) -> rusqlite::Result<Variation> {
    Ok(Variation {
        id: row.get("id")?,
        parent_id: row.get("parentId")?,
        name: row.get("name")?,
        comment: row.get("comment")?,
    })
}

fn parse_assignment_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get("id")?,
        type_table_id: row.get("typeTableId")?,
        run_min: row.get("runMin")?,
        run_max: row.get("runMax")?,
        variation_name: row.get("variationName")?,
        created_time: row.get("created")?,
        modified_time: row.get("modified")?,
        comment: row.get("comment")?,
        vault: row.get("vault")?,
    })
}
