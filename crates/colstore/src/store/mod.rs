//! Store engine: container writing, metadata reads, and row-range reads.
//!
//! A [`Store`] is a stateless handle to a container file path. Writing lays
//! out the metadata tree, streams every column through its typed codec, and
//! patches the header regions in exactly two seek-back passes (the metadata
//! block at offset 0 and the chunk-index block just before the first
//! column). Reading validates every header hash before touching column
//! data, then decompresses only the blocks spanning the requested rows.

pub mod header;

mod codec;

use crate::column::{
    ColumnAttribute, ColumnType, StringEncoding, Table, TableColumn, TableSource, Values,
    ValuesRef,
};
use crate::error::{Result, StoreError};
use header::{
    ChunkIndex, ChunksetHeader, ColNamesHeader, DataChunkHeader, KeyIndex, TableHeader,
    CHUNK_INDEX_SIZE, COL_NAMES_HEADER_SIZE, DATA_CHUNK_HEADER_BASE, TABLE_HEADER_SIZE,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stateless handle to a container file.
///
/// Every operation opens, validates, and closes the file on its own; the
/// handle itself holds nothing but the path. A file is written once and
/// read many times; a writer and a reader sharing the path concurrently is
/// unsupported.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

/// Table-level metadata decoded by [`Store::read_meta`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    /// Format version the file was written with.
    pub version: u32,
    /// Rows in the primary chunkset.
    pub nr_of_rows: u64,
    /// Columns in the primary chunkset.
    pub nr_of_cols: u32,
    /// 0-based key column positions, in key order.
    pub key_col_pos: Vec<u32>,
    /// Column names in on-disk order.
    pub col_names: Vec<String>,
    /// Per-column type, attribute, and scale.
    pub columns: Vec<ColumnMeta>,
}

/// Per-column entry of a [`TableMeta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Base column type.
    pub col_type: ColumnType,
    /// Semantic attribute.
    pub attribute: ColumnAttribute,
    /// Scale exponent.
    pub scale: i16,
}

/// Outcome of [`Store::read_table`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    /// The materialized columns, in selection order.
    pub table: Table,
    /// Selected column names, in selection order.
    pub selected_cols: Vec<String>,
    /// Selection positions of the keys surviving the selection: the prefix
    /// of the key sequence up to the first key absent from the selection.
    pub key_index: Vec<usize>,
}

/// Header state shared by the meta and table read paths.
struct HeaderState {
    meta: TableMeta,
    /// On-disk codec codes (6..=12) per column.
    col_codec_codes: Vec<u16>,
    /// Offset just past the column-names payload, where the chunk index
    /// begins.
    cursor: u64,
}

impl Store {
    /// Creates a handle for the container file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this handle operates on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `table` to the store path, compressing column blocks at the
    /// given quality (0 = uncompressed, 100 = maximum; values above 100
    /// behave as 100).
    ///
    /// The file is created from scratch; an existing file at the path is
    /// truncated. On failure the partially written file is left in place
    /// for the caller to remove.
    ///
    /// # Errors
    ///
    /// [`StoreError::EmptyTable`] / [`StoreError::NoData`] for tables
    /// without columns or rows, [`StoreError::CannotOpenWrite`] when the
    /// file cannot be created, and [`StoreError::WriteFailed`] when the
    /// stream fails mid-write.
    pub fn write<T: TableSource + ?Sized>(&self, table: &T, compress: u8) -> Result<()> {
        self.write_table(table, compress).map_err(|e| match e {
            StoreError::Io(source) => StoreError::WriteFailed(source),
            other => other,
        })
    }

    fn write_table<T: TableSource + ?Sized>(&self, table: &T, compress: u8) -> Result<()> {
        let nr_of_cols = table.nr_of_cols();
        let nr_of_rows = table.nr_of_rows();
        if nr_of_cols == 0 {
            return Err(StoreError::EmptyTable);
        }
        if nr_of_rows == 0 {
            return Err(StoreError::NoData);
        }

        let keys = table.key_columns();
        for &key in keys {
            if key as usize >= nr_of_cols {
                return Err(StoreError::ColumnOutOfRange {
                    col: key as usize,
                    nr_of_cols,
                });
            }
        }

        // Per-column metadata arrays for the chunkset record.
        let mut chunkset = ChunksetHeader {
            nr_of_rows,
            col_attributes: Vec::with_capacity(nr_of_cols),
            col_types: Vec::with_capacity(nr_of_cols),
            col_base_types: Vec::with_capacity(nr_of_cols),
            col_scales: Vec::with_capacity(nr_of_cols),
        };
        for col_nr in 0..nr_of_cols {
            let values = table.col_values(col_nr);
            if values.len() != nr_of_rows {
                return Err(StoreError::MismatchedRowCount {
                    expected: nr_of_rows,
                    actual: values.len(),
                });
            }
            let col_type = values.column_type();
            let code = col_type
                .codec_code()
                .ok_or(StoreError::UnknownType(col_type as u16))?;
            chunkset.col_types.push(code);
            chunkset.col_base_types.push(col_type as u16);
            chunkset
                .col_attributes
                .push(table.col_attribute(col_nr) as u16);
            chunkset.col_scales.push(table.col_scale(col_nr));
        }

        let table_header = TableHeader::new(nr_of_cols as u32, keys.len() as u32);
        let key_index = (!keys.is_empty()).then(|| KeyIndex {
            key_col_pos: keys.to_vec(),
        });

        let mut meta_buf = Vec::new();
        meta_buf.extend_from_slice(&table_header.to_bytes());
        if let Some(ki) = &key_index {
            meta_buf.extend_from_slice(&ki.to_bytes());
        }
        let chunkset_off = meta_buf.len();
        meta_buf.extend_from_slice(&chunkset.to_bytes());
        meta_buf.extend_from_slice(&ColNamesHeader.to_bytes());

        let file = File::create(&self.path).map_err(StoreError::CannotOpenWrite)?;
        let mut writer = BufWriter::new(file);

        // First pass: the chunkset hash is not valid until the chunk layout
        // below it exists, so it goes out zeroed and the final pass patches
        // the real metadata block over it.
        let mut placeholder = meta_buf.clone();
        placeholder[chunkset_off..chunkset_off + 8].fill(0);
        writer.write_all(&placeholder)?;

        // Column names, uncompressed, native encoding.
        let names: Vec<String> = (0..nr_of_cols)
            .map(|c| table.col_name(c).to_owned())
            .collect();
        codec::write_character(&mut writer, &names, StringEncoding::Native, 0)?;

        // Chunk index and data chunk header, as placeholders until the
        // column positions are known.
        let chunk_buf_size = CHUNK_INDEX_SIZE + DataChunkHeader::byte_size(nr_of_cols);
        writer.write_all(&vec![0u8; chunk_buf_size])?;

        // Column payloads.
        let mut position_data = Vec::with_capacity(nr_of_cols);
        for col_nr in 0..nr_of_cols {
            position_data.push(writer.stream_position()?);
            let annotation = table.col_annotation(col_nr);
            match table.col_values(col_nr) {
                ValuesRef::Character { values, encoding } => {
                    codec::write_character(&mut writer, values, encoding, compress)?
                }
                ValuesRef::Factor {
                    levels,
                    labels,
                    encoding,
                } => codec::write_factor(&mut writer, levels, labels, encoding, compress, annotation)?,
                ValuesRef::Int32(v) => codec::write_int32(&mut writer, v, compress, annotation)?,
                ValuesRef::Double(v) => codec::write_double(&mut writer, v, compress, annotation)?,
                ValuesRef::Logical(v) => codec::write_logical(&mut writer, v, compress, annotation)?,
                ValuesRef::Int64(v) => codec::write_int64(&mut writer, v, compress, annotation)?,
                ValuesRef::Byte(v) => codec::write_byte(&mut writer, v, compress, annotation)?,
            }
        }

        // First seek-back pass: patch the chunk index now that the column
        // positions are known.
        let chunk_pos =
            position_data[0] - 8 * nr_of_cols as u64 - DATA_CHUNK_HEADER_BASE as u64;
        let mut chunk_index = ChunkIndex::default();
        chunk_index.chunk_pos[0] = chunk_pos;
        chunk_index.chunk_rows[0] = nr_of_rows;
        let data_chunk = DataChunkHeader { position_data };

        writer.seek(SeekFrom::Start(chunk_pos - CHUNK_INDEX_SIZE as u64))?;
        writer.write_all(&chunk_index.to_bytes())?;
        writer.write_all(&data_chunk.to_bytes())?;

        // Second seek-back pass: the metadata block with all hashes final.
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&meta_buf)?;
        writer.flush()?;

        let file = writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))?;
        file.sync_all()?;

        debug!(
            "Wrote container {}: {} columns, {} rows, compress {}",
            self.path.display(),
            nr_of_cols,
            nr_of_rows,
            compress.min(100)
        );
        Ok(())
    }

    /// Reads and validates the metadata tree without touching column data.
    pub fn read_meta(&self) -> Result<TableMeta> {
        let file = File::open(&self.path).map_err(StoreError::CannotOpenFile)?;
        let mut reader = BufReader::new(file);
        Ok(self.read_header_state(&mut reader)?.meta)
    }

    /// Reads a row range of the selected columns into a fresh [`Table`].
    ///
    /// `selection` is a list of column names (`None` selects every column
    /// in on-disk order). `start_row` is 1-based and inclusive; `end_row`
    /// is 1-based and inclusive too, with `None` reading to the end of the
    /// table. Rows past the table's end are clamped.
    ///
    /// # Errors
    ///
    /// [`StoreError::ColumnNotFound`] for unknown selection names,
    /// [`StoreError::NegativeRow`] / [`StoreError::RowOutOfRange`] /
    /// [`StoreError::BadRange`] for invalid row ranges, plus every header
    /// validation error of [`Store::read_meta`].
    pub fn read_table(
        &self,
        selection: Option<&[&str]>,
        start_row: i64,
        end_row: Option<i64>,
    ) -> Result<ReadResult> {
        let file = File::open(&self.path).map_err(StoreError::CannotOpenFile)?;
        let mut reader = BufReader::new(file);
        let state = self.read_header_state(&mut reader)?;
        let nr_of_cols = state.meta.nr_of_cols as usize;

        // Chunk index and data chunk header follow the column names.
        reader.seek(SeekFrom::Start(state.cursor))?;
        let mut ci_buf = [0u8; CHUNK_INDEX_SIZE];
        reader.read_exact(&mut ci_buf)?;
        let chunk_index = ChunkIndex::from_bytes(&ci_buf)?;

        let mut dc_buf = vec![0u8; DataChunkHeader::byte_size(nr_of_cols)];
        reader.read_exact(&mut dc_buf)?;
        let data_chunk = DataChunkHeader::from_bytes(&dc_buf, nr_of_cols)?;

        // Resolve the column selection to on-disk positions.
        let col_index: Vec<usize> = match selection {
            None => (0..nr_of_cols).collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    state
                        .meta
                        .col_names
                        .iter()
                        .position(|n| n == name)
                        .ok_or_else(|| StoreError::ColumnNotFound((*name).to_owned()))
                })
                .collect::<Result<_>>()?,
        };

        // Resolve the 1-based row range against the chunk's row count.
        let nr_of_rows = chunk_index.chunk_rows[0];
        let first_row = start_row - 1;
        if first_row < 0 {
            return Err(StoreError::NegativeRow(start_row));
        }
        let first_row = first_row as u64;
        if first_row >= nr_of_rows {
            return Err(StoreError::RowOutOfRange {
                row: start_row,
                nr_of_rows,
            });
        }
        let mut length = nr_of_rows - first_row;
        if let Some(end) = end_row {
            if end <= first_row as i64 {
                return Err(StoreError::BadRange {
                    start: start_row,
                    end,
                });
            }
            length = length.min((end - first_row as i64) as u64);
        }

        let mut table = Table::new();
        for &col_nr in &col_index {
            let pos = data_chunk.position_data[col_nr];
            let meta = &state.meta.columns[col_nr];
            let (values, annotation) = match state.col_codec_codes[col_nr] {
                6 => {
                    let read =
                        codec::read_character(&mut reader, pos, Some((first_row, length)))?;
                    (
                        Values::Character {
                            values: read.values,
                            encoding: read.encoding,
                        },
                        String::new(),
                    )
                }
                7 => {
                    let (levels, labels, encoding, annotation) =
                        codec::read_factor(&mut reader, pos, first_row, length, nr_of_rows)?;
                    (
                        Values::Factor {
                            levels,
                            labels,
                            encoding,
                        },
                        annotation,
                    )
                }
                8 => {
                    let (v, a) = codec::read_int32(&mut reader, pos, first_row, length, nr_of_rows)?;
                    (Values::Int32(v), a)
                }
                9 => {
                    let (v, a) =
                        codec::read_double(&mut reader, pos, first_row, length, nr_of_rows)?;
                    (Values::Double(v), a)
                }
                10 => {
                    let (v, a) =
                        codec::read_logical(&mut reader, pos, first_row, length, nr_of_rows)?;
                    (Values::Logical(v), a)
                }
                11 => {
                    let (v, a) = codec::read_int64(&mut reader, pos, first_row, length, nr_of_rows)?;
                    (Values::Int64(v), a)
                }
                12 => {
                    let (v, a) = codec::read_byte(&mut reader, pos, first_row, length, nr_of_rows)?;
                    (Values::Byte(v), a)
                }
                other => return Err(StoreError::UnknownType(other)),
            };
            table.push(TableColumn {
                name: state.meta.col_names[col_nr].clone(),
                attribute: meta.attribute,
                scale: meta.scale,
                annotation,
                values,
            })?;
        }

        let key_index = remap_keys(&state.meta.key_col_pos, &col_index);
        table.set_key_columns(key_index.iter().map(|&i| i as u32).collect());
        let selected_cols = col_index
            .iter()
            .map(|&c| state.meta.col_names[c].clone())
            .collect();

        debug!(
            "Read container {}: {} of {} columns, rows {}..{}",
            self.path.display(),
            col_index.len(),
            nr_of_cols,
            first_row + 1,
            first_row + length
        );
        Ok(ReadResult {
            table,
            selected_cols,
            key_index,
        })
    }

    /// Shared header-validation prefix of the meta and table read paths.
    fn read_header_state(&self, reader: &mut BufReader<File>) -> Result<HeaderState> {
        let mut th_buf = [0u8; TABLE_HEADER_SIZE];
        reader
            .read_exact(&mut th_buf)
            .map_err(StoreError::CannotOpenRead)?;
        let table_header = TableHeader::from_bytes(&th_buf)?;
        let nr_of_cols = table_header.nr_of_cols as usize;
        let key_length = table_header.key_length as usize;

        let key_col_pos = if key_length > 0 {
            let mut ki_buf = vec![0u8; KeyIndex::byte_size(key_length)];
            reader.read_exact(&mut ki_buf)?;
            KeyIndex::from_bytes(&ki_buf)?.key_col_pos
        } else {
            Vec::new()
        };

        let mut cs_buf = vec![0u8; ChunksetHeader::byte_size(nr_of_cols)];
        reader.read_exact(&mut cs_buf)?;
        let chunkset = ChunksetHeader::from_bytes(&cs_buf, nr_of_cols)?;

        let mut cn_buf = [0u8; COL_NAMES_HEADER_SIZE];
        reader.read_exact(&mut cn_buf)?;
        ColNamesHeader::from_bytes(&cn_buf)?;

        let key_size = if key_length > 0 {
            KeyIndex::byte_size(key_length)
        } else {
            0
        };
        let names_pos = TABLE_HEADER_SIZE
            + key_size
            + ChunksetHeader::byte_size(nr_of_cols)
            + COL_NAMES_HEADER_SIZE;
        let names = codec::read_character(reader, names_pos as u64, Some((0, nr_of_cols as u64)))?;

        let mut columns = Vec::with_capacity(nr_of_cols);
        for col_nr in 0..nr_of_cols {
            let base_code = chunkset.col_base_types[col_nr];
            let attr_code = chunkset.col_attributes[col_nr];
            columns.push(ColumnMeta {
                col_type: ColumnType::from_u16(base_code)
                    .ok_or(StoreError::UnknownType(base_code))?,
                attribute: ColumnAttribute::from_u16(attr_code)
                    .ok_or(StoreError::UnknownType(attr_code))?,
                scale: chunkset.col_scales[col_nr],
            });
        }

        Ok(HeaderState {
            meta: TableMeta {
                version: table_header.version,
                nr_of_rows: chunkset.nr_of_rows,
                nr_of_cols: table_header.nr_of_cols,
                key_col_pos,
                col_names: names.values,
                columns,
            },
            col_codec_codes: chunkset.col_types,
            cursor: names.end_pos,
        })
    }
}

/// Emits the selection position of each key in key order, stopping at the
/// first key absent from the selection. A key sequence loses its utility
/// once a leading key is filtered out, so nothing past the gap survives.
fn remap_keys(key_col_pos: &[u32], col_index: &[usize]) -> Vec<usize> {
    let mut key_index = Vec::new();
    for &key in key_col_pos {
        match col_index.iter().position(|&c| c == key as usize) {
            Some(sel) => key_index.push(sel),
            None => break,
        }
    }
    key_index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_keys_all_present() {
        // Keys 0 and 2, selection reordered to [2, 0, 1].
        assert_eq!(remap_keys(&[0, 2], &[2, 0, 1]), vec![1, 0]);
    }

    #[test]
    fn test_remap_keys_stops_at_first_absent() {
        // Key 0 missing from the selection: nothing survives.
        assert_eq!(remap_keys(&[0, 2], &[2, 1]), Vec::<usize>::new());
        // Key 2 missing: only key 0 survives.
        assert_eq!(remap_keys(&[0, 2], &[0, 1]), vec![0]);
        // Later keys after the gap are dropped even when present.
        assert_eq!(remap_keys(&[0, 1, 2], &[2, 0]), vec![1]);
    }

    #[test]
    fn test_remap_keys_empty() {
        assert_eq!(remap_keys(&[], &[0, 1]), Vec::<usize>::new());
    }
}
