//! Error and Result types for colstore operations.

use std::io;
use thiserror::Error;

/// A convenience `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The error type for store operations.
///
/// Every failure is fatal for the operation that produced it; the engine
/// performs no retries and returns no partial results.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The container file could not be opened.
    #[error("Error opening file: {0}")]
    CannotOpenFile(io::Error),

    /// The table header could not be read from the stream.
    #[error("Error reading from container file: {0}")]
    CannotOpenRead(io::Error),

    /// The container file could not be created for writing.
    #[error("Error opening file for writing: {0}")]
    CannotOpenWrite(io::Error),

    /// Table header hash mismatch: the file is not a colstore container.
    #[error("File is not a colstore container or has a damaged signature")]
    UnknownFileFormat,

    /// The file requires a newer format version than this crate supports.
    #[error("File requires format version {file}, this reader supports up to {supported}")]
    UpdateRequired {
        /// Minimum format version required by the file.
        file: u32,
        /// Maximum format version this reader understands.
        supported: u32,
    },

    /// Hash mismatch in the key-index, chunkset, or column-names header.
    #[error("Damaged header found in container file")]
    DamagedHeader,

    /// Hash mismatch in the chunk index or data chunk header.
    #[error("Damaged chunk index found in container file")]
    DamagedChunkIndex,

    /// Write attempted with a table of zero rows.
    #[error("Table has no rows, nothing to write")]
    NoData,

    /// Write attempted with a table of zero columns.
    #[error("Table needs at least one column")]
    EmptyTable,

    /// A selected column name does not exist in the file.
    #[error("Selected column not found: {0}")]
    ColumnNotFound(String),

    /// A column position lies outside the table.
    #[error("Column {col} is out of range (table has {nr_of_cols} columns)")]
    ColumnOutOfRange {
        /// Offending column position.
        col: usize,
        /// Number of columns in the table.
        nr_of_cols: usize,
    },

    /// The 1-based start row was zero or negative.
    #[error("Start row should have a positive value, got {0}")]
    NegativeRow(i64),

    /// The start row lies beyond the last row of the table.
    #[error("Row selection out of range: row {row}, table has {nr_of_rows} rows")]
    RowOutOfRange {
        /// Requested 1-based start row.
        row: i64,
        /// Number of rows in the table.
        nr_of_rows: u64,
    },

    /// The end row does not lie after the start row.
    #[error("Incorrect row range: start {start}, end {end}")]
    BadRange {
        /// Requested 1-based start row.
        start: i64,
        /// Requested 1-based end row.
        end: i64,
    },

    /// An unrecognized column type code was encountered.
    #[error("Unknown column type code: {0}")]
    UnknownType(u16),

    /// An unrecognized per-block compression identifier was encountered.
    #[error("Unknown compression identifier: {0}")]
    UnknownCompression(u16),

    /// Error during compression.
    #[error("Compression error: {0}")]
    CompressionError(String),

    /// Error during decompression.
    #[error("Decompression error: {0}")]
    DecompressionError(String),

    /// A column's length does not match the table's row count.
    #[error("Column length mismatch: expected {expected} rows, got {actual}")]
    MismatchedRowCount {
        /// Row count of the table.
        expected: u64,
        /// Length of the offending column.
        actual: u64,
    },

    /// A character column's string data exceeds the u32 size-meta range.
    #[error("Character data exceeds the 4 GiB size-meta limit")]
    StringDataTooLarge,

    /// The write stream failed; the output file may be corrupt and should be
    /// removed by the caller.
    #[error("Write operation failed, container file may be corrupt: {0}")]
    WriteFailed(io::Error),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
