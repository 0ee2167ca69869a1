//! Colstore - a hash-validated, block-compressed columnar container.
//!
//! This crate serializes a dataset of typed, equal-length columns to a
//! single binary file and reads it back, with three properties doing the
//! heavy lifting:
//!
//! - every header record carries an XXH64 hash over its own bytes, so
//!   truncation, corruption, and foreign files are detected before any
//!   column data is trusted;
//! - column data is cut into fixed-element-count blocks, each compressed
//!   independently (LZ4, ZSTD, or a two-stage mix, chosen per block by a
//!   deterministic policy), so arbitrary row ranges decompress only the
//!   blocks they touch;
//! - columns are laid out independently behind a position table, so a
//!   selection of columns reads only those columns' bytes.
//!
//! # Components
//!
//! - [`Store`]: the engine; write, [`Store::read_meta`], [`Store::read_table`]
//! - [`Table`] / [`TableColumn`] / [`Values`]: concrete column containers
//! - [`TableSource`]: write-side seam for host-owned column data
//! - [`stream`]: the block streamer underneath every column codec
//!
//! # Example
//!
//! ```rust,ignore
//! use colstore::{Store, Table, TableColumn, Values};
//!
//! let mut table = Table::new();
//! table.push(TableColumn::new("id", Values::Int32(vec![1, 2, 3])))?;
//! table.push(TableColumn::new("size", Values::Double(vec![0.5, 1.5, f64::NAN])))?;
//! table.set_key_columns(vec![0]);
//!
//! let store = Store::new("dataset.col");
//! store.write(&table, 75)?;
//!
//! // Read rows 2..=3 of a single column.
//! let result = store.read_table(Some(&["size"]), 2, Some(3))?;
//! assert_eq!(result.table.nr_of_rows(), 2);
//! ```

#![deny(missing_docs)]

pub mod column;
pub mod error;
pub mod hash;
pub mod store;
pub mod stream;

pub use column::{
    scale, ColumnAttribute, ColumnType, StringEncoding, Table, TableColumn, TableSource,
    TimeScale, Values, ValuesRef,
};
pub use error::{Result, StoreError};
pub use store::header::FORMAT_VERSION;
pub use store::{ColumnMeta, ReadResult, Store, TableMeta};
