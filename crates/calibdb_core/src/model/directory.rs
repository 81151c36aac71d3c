//! Directory node model for the calibration hierarchy.
//!
//! # Responsibility
//! - Define the immutable node shape published by the directory cache.
//!
//! # Invariants
//! - `id` 0 is reserved for the synthetic root, which exists only in
//!   memory and is never stored upstream.
//! - `full_path` of a non-root node equals its parent's `full_path`
//!   joined with `name`; the cache derives it, records never carry it.
//! - Published nodes are never mutated; a rebuild produces a new
//!   generation of nodes.

use serde::{Deserialize, Serialize};

/// Stable integer database key used across all calibration models.
pub type DbKey = i64;

/// Reserved id of the synthetic root directory.
pub const ROOT_ID: DbKey = 0;

/// Full path of the synthetic root directory.
pub const ROOT_PATH: &str = "/";

/// One node of the calibration directory hierarchy.
///
/// Parent and child links are id references resolved through the cache's
/// generation index, not owning pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// Database key. 0 only for the synthetic root.
    pub id: DbKey,
    /// Database key of the parent. 0 means a child of the root.
    pub parent_id: DbKey,
    /// Leaf name, empty only for the root.
    pub name: String,
    /// Slash-joined path from the root, e.g. `/physics/calib`.
    pub full_path: String,
    /// Epoch ms creation timestamp.
    pub created_time: i64,
    /// Epoch ms last modification timestamp.
    pub modified_time: i64,
    /// Free-text description.
    pub comment: Option<String>,
}

impl Directory {
    /// Creates the synthetic in-memory root node.
    pub fn root() -> Self {
        Self {
            id: ROOT_ID,
            parent_id: ROOT_ID,
            name: String::new(),
            full_path: ROOT_PATH.to_string(),
            created_time: 0,
            modified_time: 0,
            comment: None,
        }
    }

    /// Returns whether this node is the synthetic root.
    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }
}
