use calibdb_core::vault::{
    blob_to_cells, blob_to_named_rows, blob_to_rows, cells_to_blob, rows_to_blob, VaultError,
};

#[test]
fn grid_round_trips_through_one_blob() {
    let grid = vec![
        vec!["0".to_string(), "1.204".to_string(), "ok".to_string()],
        vec!["1".to_string(), "1.318".to_string(), "dead|noisy".to_string()],
        vec!["2".to_string(), "&delimiter;".to_string(), "".to_string()],
    ];

    let blob = rows_to_blob(&grid).unwrap();
    assert!(!blob.ends_with('|'));

    let decoded = blob_to_rows(&blob, 3).unwrap();
    assert_eq!(decoded, grid);
}

#[test]
fn worked_example_from_the_store_format() {
    let blob = rows_to_blob(&[vec!["a|b", "c"], vec!["d", "e"]]).unwrap();
    assert_eq!(blob, "a&delimiter;b|c|d|e");

    let rows = blob_to_rows(&blob, 2).unwrap();
    assert_eq!(rows, vec![vec!["a|b", "c"], vec!["d", "e"]]);
}

#[test]
fn flat_and_gridded_encodes_agree() {
    let flat = cells_to_blob(&["1", "2", "3", "4", "5", "6"]).unwrap();
    let gridded = rows_to_blob(&[vec!["1", "2", "3"], vec!["4", "5", "6"]]).unwrap();
    assert_eq!(flat, gridded);
}

#[test]
fn decode_rejects_non_divisible_token_count() {
    let err = blob_to_rows("1|2|3|4|5", 2).unwrap_err();
    assert_eq!(err, VaultError::ShapeMismatch { cells: 5, columns: 2 });

    let err = blob_to_rows("1|2|3", 0).unwrap_err();
    assert!(matches!(err, VaultError::ShapeMismatch { columns: 0, .. }));
}

#[test]
fn decode_returns_nothing_on_shape_mismatch() {
    // No partial grid: the error carries the counts, not rows.
    let result = blob_to_rows("a|b|c", 2);
    assert!(result.is_err());
}

#[test]
fn named_rows_share_the_single_split_pass() {
    let columns = vec!["channel".to_string(), "gain".to_string()];
    let named = blob_to_named_rows("0|1.0|1|1.1", &columns).unwrap();

    assert_eq!(named.len(), 2);
    assert_eq!(named[0]["channel"], "0");
    assert_eq!(named[0]["gain"], "1.0");
    assert_eq!(named[1]["channel"], "1");
    assert_eq!(named[1]["gain"], "1.1");
}

#[test]
fn named_rows_reject_mismatched_column_list() {
    let columns = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let err = blob_to_named_rows("1|2|3|4", &columns).unwrap_err();
    assert_eq!(err, VaultError::ShapeMismatch { cells: 4, columns: 3 });
}

#[test]
fn lone_blob_without_delimiter_is_one_cell() {
    assert_eq!(blob_to_cells("42"), vec!["42"]);
    assert_eq!(blob_to_rows("42", 1).unwrap(), vec![vec!["42"]]);
}
