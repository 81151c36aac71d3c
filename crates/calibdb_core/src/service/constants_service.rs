//! Constants retrieval use-case service.
//!
//! # Responsibility
//! - Resolve a table path to a directory + type table through the cache.
//! - Find the newest assignment for a run, walking the variation parent
//!   chain when a variation has no constants of its own.
//! - Decode vault blobs with the table's column layout.
//!
//! # Invariants
//! - A variation is consulted at most once per lookup; the parent walk
//!   cannot loop.
//! - Decoding failures surface whole; no partial constants are returned.

use crate::cache::{CacheError, DirectoryCache};
use crate::model::assignment::Assignment;
use crate::model::directory::{Directory, ROOT_PATH};
use crate::model::table::TypeTable;
use crate::repo::assignment_repo::{AssignmentStore, StoreError};
use crate::repo::directory_repo::DirectorySource;
use crate::vault::VaultError;
use log::info;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Name of the variation every lookup ultimately falls back to.
pub const DEFAULT_VARIATION: &str = "default";

/// Result type for constants service operations.
pub type ConstantsResult<T> = Result<T, ConstantsError>;

/// Errors from constants retrieval.
#[derive(Debug)]
pub enum ConstantsError {
    /// The table path is not of the form `/dir/.../table`.
    InvalidTablePath(String),
    /// No directory exists at the path's directory part.
    DirectoryNotFound(String),
    /// The directory exists but holds no table of that name.
    TableNotFound(String),
    /// No variation with the requested name exists.
    VariationNotFound(String),
    /// No assignment covers the run in the variation chain.
    NoAssignment {
        table_path: String,
        run: i64,
        variation: String,
    },
    /// Directory cache failure.
    Cache(CacheError),
    /// Constants store failure.
    Store(StoreError),
    /// Vault blob decode failure.
    Vault(VaultError),
}

impl Display for ConstantsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTablePath(path) => {
                write!(f, "invalid table path `{path}`, expected `/dir/table`")
            }
            Self::DirectoryNotFound(path) => write!(f, "directory not found: `{path}`"),
            Self::TableNotFound(path) => write!(f, "type table not found: `{path}`"),
            Self::VariationNotFound(name) => write!(f, "variation not found: `{name}`"),
            Self::NoAssignment {
                table_path,
                run,
                variation,
            } => write!(
                f,
                "no assignment for table `{table_path}` run {run} in variation `{variation}` or its parents"
            ),
            Self::Cache(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Vault(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConstantsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Cache(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Vault(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CacheError> for ConstantsError {
    fn from(value: CacheError) -> Self {
        Self::Cache(value)
    }
}

impl From<StoreError> for ConstantsError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<VaultError> for ConstantsError {
    fn from(value: VaultError) -> Self {
        Self::Vault(value)
    }
}

/// One constants lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantsRequest {
    /// Full table path, e.g. `/physics/calib/sc_gains`.
    pub table_path: String,
    /// Run number the constants must cover.
    pub run: i64,
    /// Variation to start the lookup in.
    pub variation: String,
}

impl ConstantsRequest {
    /// Creates a request against the default variation.
    pub fn new(table_path: impl Into<String>, run: i64) -> Self {
        Self {
            table_path: table_path.into(),
            run,
            variation: DEFAULT_VARIATION.to_string(),
        }
    }

    /// Creates a request against a named variation.
    pub fn with_variation(
        table_path: impl Into<String>,
        run: i64,
        variation: impl Into<String>,
    ) -> Self {
        Self {
            table_path: table_path.into(),
            run,
            variation: variation.into(),
        }
    }
}

/// Constants retrieval facade over one directory cache and one store.
pub struct ConstantsService<S: DirectorySource, A: AssignmentStore> {
    cache: DirectoryCache<S>,
    store: A,
}

impl<S: DirectorySource, A: AssignmentStore> ConstantsService<S, A> {
    /// Creates a service from a cache and a constants store.
    pub fn new(cache: DirectoryCache<S>, store: A) -> Self {
        Self { cache, store }
    }

    /// The directory cache, for freshness control and tree browsing.
    pub fn cache(&self) -> &DirectoryCache<S> {
        &self.cache
    }

    /// Resolves a full table path into its type table with columns.
    pub fn type_table(&self, table_path: &str) -> ConstantsResult<TypeTable> {
        let (directory_path, table_name) = split_table_path(table_path)?;
        let directory = self.resolve_directory(directory_path)?;
        self.store
            .type_table(directory.id, table_name)?
            .ok_or_else(|| ConstantsError::TableNotFound(table_path.to_string()))
    }

    /// Fetches the newest matching assignment without decoding its blob.
    pub fn assignment(&self, request: &ConstantsRequest) -> ConstantsResult<Assignment> {
        let (_, assignment) = self.lookup(request)?;
        Ok(assignment)
    }

    /// Fetches constants as rectangular rows of cell strings.
    pub fn constants(&self, request: &ConstantsRequest) -> ConstantsResult<Vec<Vec<String>>> {
        let (table, assignment) = self.lookup(request)?;
        assignment.rows(table.column_count()).map_err(Into::into)
    }

    /// Fetches constants as one column-name→value map per row.
    pub fn named_constants(
        &self,
        request: &ConstantsRequest,
    ) -> ConstantsResult<Vec<HashMap<String, String>>> {
        let (table, assignment) = self.lookup(request)?;
        assignment
            .named_rows(&table.column_names())
            .map_err(Into::into)
    }

    fn resolve_directory(&self, path: &str) -> ConstantsResult<Arc<Directory>> {
        if path == ROOT_PATH {
            return Ok(self.cache.root());
        }
        self.cache
            .get_by_path(path)?
            .ok_or_else(|| ConstantsError::DirectoryNotFound(path.to_string()))
    }

    fn lookup(&self, request: &ConstantsRequest) -> ConstantsResult<(TypeTable, Assignment)> {
        let table = self.type_table(&request.table_path)?;

        let mut variation = self
            .store
            .variation_by_name(&request.variation)?
            .ok_or_else(|| ConstantsError::VariationNotFound(request.variation.clone()))?;

        let mut visited = HashSet::from([variation.id]);
        loop {
            if let Some(assignment) =
                self.store
                    .latest_assignment(table.id, request.run, variation.id)?
            {
                info!(
                    "event=constants_lookup module=service status=ok table={} run={} variation={} assignment={}",
                    request.table_path, request.run, variation.name, assignment.id
                );
                return Ok((table, assignment));
            }

            let Some(parent_id) = variation.parent().filter(|id| !visited.contains(id)) else {
                return Err(ConstantsError::NoAssignment {
                    table_path: request.table_path.clone(),
                    run: request.run,
                    variation: request.variation.clone(),
                });
            };

            visited.insert(parent_id);
            variation = self
                .store
                .variation_by_id(parent_id)?
                .ok_or_else(|| ConstantsError::VariationNotFound(format!("id {parent_id}")))?;
        }
    }
}

/// Splits `/dir/.../table` into the directory path and the table name.
fn split_table_path(table_path: &str) -> ConstantsResult<(&str, &str)> {
    if !table_path.starts_with('/') {
        return Err(ConstantsError::InvalidTablePath(table_path.to_string()));
    }

    let trimmed = table_path.trim_end_matches('/');
    let Some((directory_path, table_name)) = trimmed.rsplit_once('/') else {
        return Err(ConstantsError::InvalidTablePath(table_path.to_string()));
    };
    if table_name.is_empty() {
        return Err(ConstantsError::InvalidTablePath(table_path.to_string()));
    }

    let directory_path = if directory_path.is_empty() {
        ROOT_PATH
    } else {
        directory_path
    };
    Ok((directory_path, table_name))
}
