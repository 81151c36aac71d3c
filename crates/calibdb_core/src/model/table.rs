//! Type-table model: the typed column layout of one constants table.
//!
//! # Responsibility
//! - Describe a constants table well enough to decode its vault blobs.
//!
//! # Invariants
//! - `columns` is ordered by the schema's `columnOrder` field; blob
//!   decoding depends on that order.

use crate::model::directory::DbKey;
use serde::{Deserialize, Serialize};

/// Cell type of one type-table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int,
    #[serde(rename = "uint")]
    UInt,
    Long,
    #[serde(rename = "ulong")]
    ULong,
    Double,
    String,
    Bool,
}

impl ColumnType {
    /// Database string for this column type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Long => "long",
            Self::ULong => "ulong",
            Self::Double => "double",
            Self::String => "string",
            Self::Bool => "bool",
        }
    }

    /// Parses the database string form, `None` for unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "int" => Some(Self::Int),
            "uint" => Some(Self::UInt),
            "long" => Some(Self::Long),
            "ulong" => Some(Self::ULong),
            "double" => Some(Self::Double),
            "string" => Some(Self::String),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }
}

/// One named, typed column of a type table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTableColumn {
    pub name: String,
    pub column_type: ColumnType,
}

/// Constants table descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTable {
    /// Database key.
    pub id: DbKey,
    /// Owning directory id.
    pub directory_id: DbKey,
    /// Table name, unique within its directory.
    pub name: String,
    /// Columns in decode order.
    pub columns: Vec<TypeTableColumn>,
    /// Nominal number of rows per constants set.
    pub rows_count: i64,
    /// Free-text description.
    pub comment: Option<String>,
}

impl TypeTable {
    /// Column names in decode order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}
