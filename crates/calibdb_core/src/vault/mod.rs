//! Vault blob codec: tabular constants as one delimited text blob.
//!
//! The store persists every cell range as a single string column
//! (`constantSets.vault`): cell values joined row-major with `|`, where a
//! literal `|` inside a cell is written as `&delimiter;`. A literal
//! `&delimiter;` inside a cell is protected by a sentinel substitution
//! applied before delimiter escaping and reversed after delimiter
//! unescaping, keeping both substitutions reversible. The column count
//! is never embedded in the blob; callers supply it on decode.
//!
//! # Responsibility
//! - Encode a rectangular grid of cell values into one blob.
//! - Decode a blob back into cells, rectangular rows, or named rows.
//!
//! # Invariants
//! - Encode and decode share the same delimiter and escape marker, so
//!   `blob_to_rows(rows_to_blob(grid), width)` restores the grid.
//! - A blob never ends with a trailing delimiter.
//! - Shape violations fail whole; no partial grid is ever returned.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Cell separator used inside vault blobs.
pub const BLOB_DELIMITER: char = '|';

/// Marker substituted for a literal delimiter inside a cell value.
pub const DELIMITER_ESCAPE: &str = "&delimiter;";

/// Sentinel substituted for a literal escape marker before delimiter
/// escaping, so cells that already contain the marker survive the round
/// trip. Applied first on encode, reversed last on decode.
const ESCAPE_SENTINEL: &str = "&escaped-delimiter;";

/// Result type for vault codec operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors from vault blob encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Encode called with zero cells; an empty blob would be
    /// indistinguishable from one empty cell.
    EmptyInput,
    /// Cell count cannot be shaped into rows of the requested width.
    ShapeMismatch { cells: usize, columns: usize },
}

impl Display for VaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "vault blob requires at least one cell"),
            Self::ShapeMismatch { cells, columns } => write!(
                f,
                "cannot shape {cells} cells into rows of {columns} columns"
            ),
        }
    }
}

impl Error for VaultError {}

/// Encodes a flat row-major cell sequence into one vault blob.
pub fn cells_to_blob<S: AsRef<str>>(cells: &[S]) -> VaultResult<String> {
    if cells.is_empty() {
        return Err(VaultError::EmptyInput);
    }

    let escaped: Vec<String> = cells.iter().map(|cell| escape_cell(cell.as_ref())).collect();
    Ok(escaped.join(&BLOB_DELIMITER.to_string()))
}

/// Encodes a rectangular grid into one vault blob.
///
/// Every row must have the width of the first row; a ragged grid is a
/// shape error, not something to truncate or pad.
pub fn rows_to_blob<S: AsRef<str>>(rows: &[Vec<S>]) -> VaultResult<String> {
    let Some(first) = rows.first() else {
        return Err(VaultError::EmptyInput);
    };

    let columns = first.len();
    if columns == 0 {
        return Err(VaultError::EmptyInput);
    }

    for row in rows {
        if row.len() != columns {
            return Err(VaultError::ShapeMismatch {
                cells: row.len(),
                columns,
            });
        }
    }

    let mut cells = Vec::with_capacity(rows.len() * columns);
    for row in rows {
        for cell in row {
            cells.push(cell.as_ref());
        }
    }
    cells_to_blob(&cells)
}

/// Decodes a blob into its flat row-major cell sequence.
///
/// Splitting and unescaping happen in one pass; every other decode shape
/// is derived from this function without re-parsing the blob.
pub fn blob_to_cells(blob: &str) -> Vec<String> {
    blob.split(BLOB_DELIMITER).map(unescape_cell).collect()
}

/// Decodes a blob into rows of `column_count` cells each.
pub fn blob_to_rows(blob: &str, column_count: usize) -> VaultResult<Vec<Vec<String>>> {
    shape_rows(blob_to_cells(blob), column_count)
}

/// Decodes a blob into one name→value map per row.
///
/// The column count is the length of `column_names`.
pub fn blob_to_named_rows(
    blob: &str,
    column_names: &[String],
) -> VaultResult<Vec<HashMap<String, String>>> {
    let rows = shape_rows(blob_to_cells(blob), column_names.len())?;
    Ok(rows
        .into_iter()
        .map(|row| column_names.iter().cloned().zip(row).collect())
        .collect())
}

fn shape_rows(cells: Vec<String>, column_count: usize) -> VaultResult<Vec<Vec<String>>> {
    if column_count == 0 || cells.len() % column_count != 0 {
        return Err(VaultError::ShapeMismatch {
            cells: cells.len(),
            columns: column_count,
        });
    }

    let mut rows = Vec::with_capacity(cells.len() / column_count);
    let mut row = Vec::with_capacity(column_count);
    for cell in cells {
        row.push(cell);
        if row.len() == column_count {
            rows.push(std::mem::replace(&mut row, Vec::with_capacity(column_count)));
        }
    }
    Ok(rows)
}

fn escape_cell(cell: &str) -> String {
    cell.replace(DELIMITER_ESCAPE, ESCAPE_SENTINEL)
        .replace(BLOB_DELIMITER, DELIMITER_ESCAPE)
}

fn unescape_cell(token: &str) -> String {
    token
        .replace(DELIMITER_ESCAPE, &BLOB_DELIMITER.to_string())
        .replace(ESCAPE_SENTINEL, DELIMITER_ESCAPE)
}

#[cfg(test)]
mod tests {
    use super::{blob_to_cells, blob_to_rows, cells_to_blob, rows_to_blob, VaultError};

    #[test]
    fn encode_escapes_delimiter_inside_cells() {
        let blob = rows_to_blob(&[vec!["a|b", "c"], vec!["d", "e"]])
            .expect("rectangular grid should encode");
        assert_eq!(blob, "a&delimiter;b|c|d|e");
    }

    #[test]
    fn decode_restores_escaped_cells() {
        let rows = blob_to_rows("a&delimiter;b|c|d|e", 2).expect("well-shaped blob should decode");
        assert_eq!(rows, vec![vec!["a|b", "c"], vec!["d", "e"]]);
    }

    #[test]
    fn single_cell_round_trip() {
        let blob = cells_to_blob(&["only"]).expect("one cell should encode");
        assert_eq!(blob, "only");
        assert_eq!(blob_to_cells(&blob), vec!["only"]);
    }

    #[test]
    fn cells_containing_the_escape_marker_round_trip() {
        let cells = ["a&delimiter;b", "c|d", "plain"];
        let blob = cells_to_blob(&cells).expect("marker-bearing cells should encode");
        assert_eq!(blob_to_cells(&blob), cells.to_vec());
    }

    #[test]
    fn empty_cells_are_preserved() {
        let blob = cells_to_blob(&["", "x", ""]).expect("empty cells are valid values");
        assert_eq!(blob, "|x|");
        assert_eq!(blob_to_cells(&blob), vec!["", "x", ""]);
    }

    #[test]
    fn encode_rejects_zero_cells() {
        let cells: Vec<&str> = Vec::new();
        assert_eq!(cells_to_blob(&cells), Err(VaultError::EmptyInput));

        let rows: Vec<Vec<&str>> = Vec::new();
        assert_eq!(rows_to_blob(&rows), Err(VaultError::EmptyInput));
    }

    #[test]
    fn encode_rejects_ragged_rows() {
        let err = rows_to_blob(&[vec!["a", "b"], vec!["c"]])
            .expect_err("ragged grid must not encode");
        assert_eq!(err, VaultError::ShapeMismatch { cells: 1, columns: 2 });
    }
}
