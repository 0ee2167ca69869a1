//! Row-slicing and column-selection behavior across block boundaries.

use colstore::{Store, StringEncoding, Table, TableColumn, Values};
use tempfile::TempDir;

/// A table long enough that every type spans several blocks.
fn long_table(rows: usize) -> Table {
    let mut table = Table::new();
    table
        .push(TableColumn::new(
            "i",
            Values::Int32((0..rows).map(|i| i as i32).collect()),
        ))
        .unwrap();
    table
        .push(TableColumn::new(
            "d",
            Values::Double((0..rows).map(|i| (i as f64).sqrt()).collect()),
        ))
        .unwrap();
    table
        .push(TableColumn::new(
            "s",
            Values::Character {
                values: (0..rows).map(|i| format!("row-{:06}", i)).collect(),
                encoding: StringEncoding::Utf8,
            },
        ))
        .unwrap();
    table
        .push(TableColumn::new(
            "l",
            Values::Logical((0..rows).map(|i| ((i / 3) % 2) as i32).collect()),
        ))
        .unwrap();
    table
}

#[test]
fn test_slicing_matches_full_read() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("slices.col");
    let rows = 20_000usize;
    let table = long_table(rows);

    let store = Store::new(&path);
    store.write(&table, 60).unwrap();
    let full = store.read_table(None, 1, None).unwrap();

    // Ranges chosen to land on, before, and after block boundaries
    // (int blocks hold 4096 elements, doubles 2048, logicals 16384).
    for (a, b) in [
        (1u64, 1u64),
        (1, 100),
        (4096, 4097),
        (4097, 8192),
        (2047, 2049),
        (16384, 16390),
        (19_990, 20_000),
        (1, 20_000),
    ] {
        let sliced = store
            .read_table(None, a as i64, Some(b as i64))
            .unwrap();
        let expected_len = b - a + 1;
        assert_eq!(sliced.table.nr_of_rows(), expected_len, "range {}..={}", a, b);

        for (full_col, sliced_col) in full.table.columns().iter().zip(sliced.table.columns()) {
            let lo = (a - 1) as usize;
            let hi = b as usize;
            match (&full_col.values, &sliced_col.values) {
                (Values::Int32(f), Values::Int32(s)) => assert_eq!(s, &f[lo..hi]),
                (Values::Double(f), Values::Double(s)) => assert_eq!(s, &f[lo..hi]),
                (Values::Character { values: f, .. }, Values::Character { values: s, .. }) => {
                    assert_eq!(s, &f[lo..hi])
                }
                (Values::Logical(f), Values::Logical(s)) => assert_eq!(s, &f[lo..hi]),
                other => panic!("type mismatch: {:?}", other),
            }
        }
    }
}

#[test]
fn test_single_column_read_equals_full_read() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("independent.col");
    let table = long_table(10_000);

    let store = Store::new(&path);
    store.write(&table, 85).unwrap();

    let full = store.read_table(None, 501, Some(1500)).unwrap();
    for (col_nr, name) in ["i", "d", "s", "l"].into_iter().enumerate() {
        let single = store.read_table(Some(&[name]), 501, Some(1500)).unwrap();
        assert_eq!(single.table.nr_of_cols(), 1);
        assert_eq!(single.selected_cols, vec![name.to_string()]);
        assert_eq!(
            single.table.column(0).unwrap().values,
            full.table.column(col_nr).unwrap().values,
            "column {}",
            name
        );
    }
}

#[test]
fn test_selection_order_is_preserved() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("order.col");
    let table = long_table(100);

    let store = Store::new(&path);
    store.write(&table, 0).unwrap();

    let result = store.read_table(Some(&["l", "i", "s"]), 1, None).unwrap();
    assert_eq!(result.selected_cols, vec!["l", "i", "s"]);
    assert!(matches!(
        result.table.column(0).unwrap().values,
        Values::Logical(_)
    ));
    assert!(matches!(
        result.table.column(1).unwrap().values,
        Values::Int32(_)
    ));
    assert!(matches!(
        result.table.column(2).unwrap().values,
        Values::Character { .. }
    ));

    // The same column may appear more than once in a selection.
    let result = store.read_table(Some(&["i", "i"]), 1, None).unwrap();
    assert_eq!(result.table.nr_of_cols(), 2);
    assert_eq!(
        result.table.column(0).unwrap().values,
        result.table.column(1).unwrap().values
    );
}

#[test]
fn test_tail_slice_of_every_type() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tail.col");
    let rows = 4097usize; // one full int block plus a single-element tail
    let table = long_table(rows);

    let store = Store::new(&path);
    store.write(&table, 40).unwrap();

    let result = store.read_table(None, rows as i64, None).unwrap();
    assert_eq!(result.table.nr_of_rows(), 1);
    match &result.table.column(0).unwrap().values {
        Values::Int32(v) => assert_eq!(v, &[(rows - 1) as i32]),
        other => panic!("wrong type: {:?}", other),
    }
    match &result.table.column(2).unwrap().values {
        Values::Character { values, .. } => {
            assert_eq!(values, &[format!("row-{:06}", rows - 1)])
        }
        other => panic!("wrong type: {:?}", other),
    }
}
