//! Variation model: a named line of constants overriding its parent.
//!
//! # Invariants
//! - The `default` variation is the root of the parent chain.
//! - `parent_id` 0 means the variation has no parent.

use crate::model::directory::DbKey;
use serde::{Deserialize, Serialize};

/// One calibration variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variation {
    /// Database key.
    pub id: DbKey,
    /// Parent variation id, 0 when the chain ends here.
    pub parent_id: DbKey,
    /// Unique variation name, e.g. `default` or `mc_2026`.
    pub name: String,
    /// Free-text description.
    pub comment: Option<String>,
}

impl Variation {
    /// Returns the parent id when a parent exists.
    pub fn parent(&self) -> Option<DbKey> {
        if self.parent_id > 0 && self.parent_id != self.id {
            Some(self.parent_id)
        } else {
            None
        }
    }
}
