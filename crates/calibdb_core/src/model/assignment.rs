//! Assignment model: one stored constants blob bound to a run range and
//! a variation.
//!
//! # Responsibility
//! - Carry the raw vault blob together with its run/variation binding.
//! - Decode the blob through the vault codec on demand.
//!
//! # Invariants
//! - `run_min <= run_max`.
//! - `vault` is stored exactly as persisted; decoding never mutates it.

use crate::model::directory::DbKey;
use crate::vault::{self, VaultResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One constants assignment as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Database key.
    pub id: DbKey,
    /// Type table this assignment belongs to.
    pub type_table_id: DbKey,
    /// First run the constants are valid for.
    pub run_min: i64,
    /// Last run the constants are valid for.
    pub run_max: i64,
    /// Name of the variation the constants were stored under.
    pub variation_name: String,
    /// Epoch ms creation timestamp.
    pub created_time: i64,
    /// Epoch ms last modification timestamp.
    pub modified_time: i64,
    /// Free-text description.
    pub comment: Option<String>,
    /// Raw delimited constants blob.
    pub vault: String,
}

impl Assignment {
    /// Returns whether `run` falls inside this assignment's run range.
    pub fn covers_run(&self, run: i64) -> bool {
        self.run_min <= run && run <= self.run_max
    }

    /// Decodes the blob into the flat row-major cell sequence.
    pub fn cells(&self) -> Vec<String> {
        vault::blob_to_cells(&self.vault)
    }

    /// Decodes the blob into rows of `column_count` cells.
    pub fn rows(&self, column_count: usize) -> VaultResult<Vec<Vec<String>>> {
        vault::blob_to_rows(&self.vault, column_count)
    }

    /// Decodes the blob into one column-name→value map per row.
    pub fn named_rows(&self, column_names: &[String]) -> VaultResult<Vec<HashMap<String, String>>> {
        vault::blob_to_named_rows(&self.vault, column_names)
    }
}
