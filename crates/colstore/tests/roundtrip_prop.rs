//! Property tests: write-then-read restores any table at any compression
//! setting.

use colstore::{Store, StringEncoding, Table, TableColumn, Values};
use proptest::prelude::*;
use tempfile::TempDir;

fn table_strategy() -> impl Strategy<Value = (Table, u8)> {
    (1usize..300).prop_flat_map(|rows| {
        (
            prop::collection::vec(any::<i32>(), rows),
            prop::collection::vec(any::<f64>(), rows),
            prop::collection::vec("[a-z0-9 ]{0,12}", rows),
            prop::collection::vec(prop::sample::select(vec![0i32, 1, i32::MIN]), rows),
            prop::collection::vec(any::<i64>(), rows),
            prop::sample::select(vec![0u8, 25, 50, 75, 100]),
        )
            .prop_map(|(ints, doubles, strings, logicals, longs, compress)| {
                let mut table = Table::new();
                table
                    .push(TableColumn::new("ints", Values::Int32(ints)))
                    .unwrap();
                table
                    .push(TableColumn::new("doubles", Values::Double(doubles)))
                    .unwrap();
                table
                    .push(TableColumn::new(
                        "strings",
                        Values::Character {
                            values: strings,
                            encoding: StringEncoding::Utf8,
                        },
                    ))
                    .unwrap();
                table
                    .push(TableColumn::new("logicals", Values::Logical(logicals)))
                    .unwrap();
                table
                    .push(TableColumn::new("longs", Values::Int64(longs)))
                    .unwrap();
                (table, compress)
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_roundtrip_preserves_every_column((table, compress) in table_strategy()) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::new(temp_dir.path().join("prop.col"));
        store.write(&table, compress).unwrap();

        let result = store.read_table(None, 1, None).unwrap();
        prop_assert_eq!(result.table.nr_of_rows(), table.nr_of_rows());

        for (orig, read) in table.columns().iter().zip(result.table.columns()) {
            match (&orig.values, &read.values) {
                (Values::Double(a), Values::Double(b)) => {
                    prop_assert_eq!(a.len(), b.len());
                    for (x, y) in a.iter().zip(b.iter()) {
                        prop_assert_eq!(x.to_bits(), y.to_bits());
                    }
                }
                (a, b) => prop_assert_eq!(a, b),
            }
        }
    }

    #[test]
    fn prop_any_slice_matches_the_table(
        (table, compress) in table_strategy(),
        raw_start in 0u64..300,
        raw_len in 1u64..300,
    ) {
        let rows = table.nr_of_rows();
        let start = raw_start % rows + 1; // 1-based
        let end = (start + raw_len - 1).min(rows);

        let temp_dir = TempDir::new().unwrap();
        let store = Store::new(temp_dir.path().join("prop_slice.col"));
        store.write(&table, compress).unwrap();

        let result = store
            .read_table(None, start as i64, Some(end as i64))
            .unwrap();
        prop_assert_eq!(result.table.nr_of_rows(), end - start + 1);

        let lo = (start - 1) as usize;
        let hi = end as usize;
        for (orig, read) in table.columns().iter().zip(result.table.columns()) {
            match (&orig.values, &read.values) {
                (Values::Int32(a), Values::Int32(b)) => prop_assert_eq!(&a[lo..hi], &b[..]),
                (Values::Int64(a), Values::Int64(b)) => prop_assert_eq!(&a[lo..hi], &b[..]),
                (Values::Logical(a), Values::Logical(b)) => prop_assert_eq!(&a[lo..hi], &b[..]),
                (Values::Character { values: a, .. }, Values::Character { values: b, .. }) => {
                    prop_assert_eq!(&a[lo..hi], &b[..])
                }
                (Values::Double(a), Values::Double(b)) => {
                    for (x, y) in a[lo..hi].iter().zip(b.iter()) {
                        prop_assert_eq!(x.to_bits(), y.to_bits());
                    }
                }
                _ => prop_assert!(false, "column type changed in roundtrip"),
            }
        }
    }
}
