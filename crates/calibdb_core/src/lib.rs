//! Client data-access core for a hierarchical calibration-constants store.
//! This crate is the single source of truth for tree and blob invariants.

pub mod cache;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod vault;

pub use cache::{CacheError, CacheResult, DirectoryCache, Freshness, Generation, StructuralError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::assignment::Assignment;
pub use model::directory::{DbKey, Directory, ROOT_ID, ROOT_PATH};
pub use model::table::{ColumnType, TypeTable, TypeTableColumn};
pub use model::variation::Variation;
pub use repo::assignment_repo::{AssignmentStore, SqliteAssignmentStore, StoreError};
pub use repo::directory_repo::{
    ChangeSignal, DirectoryRecord, DirectorySource, SourceError, SourceResult,
    SqliteDirectorySource,
};
pub use service::constants_service::{
    ConstantsError, ConstantsRequest, ConstantsService, DEFAULT_VARIATION,
};
pub use vault::{VaultError, VaultResult, BLOB_DELIMITER, DELIMITER_ESCAPE};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
