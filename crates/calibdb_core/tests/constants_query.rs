use calibdb_core::db::open_db_in_memory;
use calibdb_core::{
    ColumnType, ConstantsError, ConstantsRequest, ConstantsService, DirectoryCache, Freshness,
    SqliteAssignmentStore, SqliteDirectorySource,
};
use rusqlite::Connection;

fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO directories (id, parentId, name) VALUES
            (1, 0, 'physics'),
            (2, 1, 'calib');
         INSERT INTO typeTables (id, directoryId, name, nRows, nColumns) VALUES
            (10, 2, 'sc_gains', 2, 2),
            (11, 2, 'bad_channels', 1, 1);
         INSERT INTO columns (typeId, name, columnType, columnOrder) VALUES
            (10, 'channel', 'int', 0),
            (10, 'gain', 'double', 1),
            (11, 'label', 'string', 0);
         INSERT INTO variations (id, parentId, name) VALUES
            (5, 1, 'mc');
         INSERT INTO runRanges (id, runMin, runMax) VALUES
            (20, 1000, 2000);
         INSERT INTO constantSets (id, vault, constantTypeId) VALUES
            (30, '0|1.0|1|1.1', 10),
            (31, 'dead&delimiter;noisy', 11);
         INSERT INTO assignments (id, runRangeId, variationId, constantSetId) VALUES
            (40, 20, 1, 30),
            (41, 20, 1, 31);",
    )
    .unwrap();
    conn
}

fn service(
    conn: &Connection,
) -> ConstantsService<SqliteDirectorySource<'_>, SqliteAssignmentStore<'_>> {
    let cache = DirectoryCache::new(SqliteDirectorySource::try_new(conn).unwrap());
    let store = SqliteAssignmentStore::try_new(conn).unwrap();
    ConstantsService::new(cache, store)
}

#[test]
fn type_table_resolves_with_ordered_columns() {
    let conn = setup();
    let service = service(&conn);

    let table = service.type_table("/physics/calib/sc_gains").unwrap();
    assert_eq!(table.id, 10);
    assert_eq!(table.directory_id, 2);
    assert_eq!(table.rows_count, 2);
    assert_eq!(table.column_names(), vec!["channel", "gain"]);
    assert_eq!(table.columns[0].column_type, ColumnType::Int);
    assert_eq!(table.columns[1].column_type, ColumnType::Double);
}

#[test]
fn constants_decode_into_rectangular_rows() {
    let conn = setup();
    let service = service(&conn);

    let rows = service
        .constants(&ConstantsRequest::new("/physics/calib/sc_gains", 1500))
        .unwrap();
    assert_eq!(rows, vec![vec!["0", "1.0"], vec!["1", "1.1"]]);
}

#[test]
fn named_constants_map_columns_to_cells() {
    let conn = setup();
    let service = service(&conn);

    let rows = service
        .named_constants(&ConstantsRequest::new("/physics/calib/sc_gains", 1500))
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["channel"], "0");
    assert_eq!(rows[0]["gain"], "1.0");
    assert_eq!(rows[1]["gain"], "1.1");
}

#[test]
fn escaped_cells_survive_storage_round_trip() {
    let conn = setup();
    let service = service(&conn);

    let rows = service
        .constants(&ConstantsRequest::new("/physics/calib/bad_channels", 1000))
        .unwrap();
    assert_eq!(rows, vec![vec!["dead|noisy"]]);
}

#[test]
fn variation_without_own_constants_falls_back_to_parent() {
    let conn = setup();
    let service = service(&conn);

    let assignment = service
        .assignment(&ConstantsRequest::with_variation(
            "/physics/calib/sc_gains",
            1500,
            "mc",
        ))
        .unwrap();
    assert_eq!(assignment.variation_name, "default");
    assert_eq!(assignment.id, 40);
}

#[test]
fn variation_with_own_constants_shadows_parent() {
    let conn = setup();
    conn.execute_batch(
        "INSERT INTO constantSets (id, vault, constantTypeId) VALUES (32, '0|2.0|1|2.1', 10);
         INSERT INTO assignments (id, runRangeId, variationId, constantSetId)
         VALUES (42, 20, 5, 32);",
    )
    .unwrap();
    let service = service(&conn);

    let request = ConstantsRequest::with_variation("/physics/calib/sc_gains", 1500, "mc");
    let assignment = service.assignment(&request).unwrap();
    assert_eq!(assignment.variation_name, "mc");

    let rows = service.constants(&request).unwrap();
    assert_eq!(rows, vec![vec!["0", "2.0"], vec!["1", "2.1"]]);
}

#[test]
fn newest_assignment_wins_within_a_variation() {
    let conn = setup();
    conn.execute_batch(
        "INSERT INTO constantSets (id, vault, constantTypeId) VALUES (33, '9|9.9|8|8.8', 10);
         INSERT INTO assignments (id, runRangeId, variationId, constantSetId)
         VALUES (43, 20, 1, 33);",
    )
    .unwrap();
    let service = service(&conn);

    let rows = service
        .constants(&ConstantsRequest::new("/physics/calib/sc_gains", 1500))
        .unwrap();
    assert_eq!(rows, vec![vec!["9", "9.9"], vec!["8", "8.8"]]);
}

#[test]
fn run_outside_every_range_yields_no_assignment() {
    let conn = setup();
    let service = service(&conn);

    let err = service
        .constants(&ConstantsRequest::new("/physics/calib/sc_gains", 9999))
        .unwrap_err();
    assert!(matches!(err, ConstantsError::NoAssignment { run: 9999, .. }));
}

#[test]
fn missing_table_directory_and_variation_report_typed_errors() {
    let conn = setup();
    let service = service(&conn);

    let err = service.type_table("/physics/calib/missing").unwrap_err();
    assert!(matches!(err, ConstantsError::TableNotFound(_)));

    let err = service.type_table("/nowhere/sc_gains").unwrap_err();
    assert!(matches!(err, ConstantsError::DirectoryNotFound(_)));

    let err = service
        .constants(&ConstantsRequest::with_variation(
            "/physics/calib/sc_gains",
            1500,
            "ghost",
        ))
        .unwrap_err();
    assert!(matches!(err, ConstantsError::VariationNotFound(_)));
}

#[test]
fn directory_changes_are_picked_up_through_the_change_signal() {
    let conn = setup();
    let service = service(&conn);

    assert!(service.cache().get_by_path("/physics/online").unwrap().is_none());

    conn.execute(
        "INSERT INTO directories (id, parentId, name) VALUES (3, 1, 'online');",
        [],
    )
    .unwrap();

    assert_eq!(service.cache().ensure_fresh().unwrap(), Freshness::Rebuilt);
    let online = service
        .cache()
        .get_by_path("/physics/online")
        .unwrap()
        .expect("new directory should be visible after refresh");
    assert_eq!(online.parent_id, 1);
}

#[test]
fn read_models_serialize_with_snake_case_fields() {
    let conn = setup();
    let service = service(&conn);

    let table = service.type_table("/physics/calib/sc_gains").unwrap();
    let value = serde_json::to_value(&table).unwrap();
    assert_eq!(value["columns"][0]["column_type"], "int");
    assert_eq!(value["name"], "sc_gains");
}
