//! Hash-validated header records of the container format.
//!
//! A container file opens with a tree of fixed-layout records, each
//! reserving its first 8 bytes for a hash over the remainder of the record:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Table header (44 bytes, at offset 0)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Key index (8 + 4·keyLength bytes, only when keys exist)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Chunkset header (76 + 8·nrOfCols bytes)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Column-names header (24 bytes) + character payload          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Chunk index (96 bytes)                                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Data chunk header (24 + 8·nrOfCols bytes)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Column payloads (block streams)                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Records are parsed from exact-size buffers into typed structs after hash
//! validation; serialization writes the same layout back, computing the
//! leading hash last. All integers are little-endian.

use crate::error::{Result, StoreError};
use crate::hash::hash64;

/// Current container format version.
pub const FORMAT_VERSION: u32 = 1;

/// Table header size in bytes.
pub const TABLE_HEADER_SIZE: usize = 44;

/// Fixed part of the chunkset header, before the per-column arrays.
pub const CHUNKSET_HEADER_BASE: usize = 76;

/// Column-names header size in bytes.
pub const COL_NAMES_HEADER_SIZE: usize = 24;

/// Chunk index record size in bytes.
pub const CHUNK_INDEX_SIZE: usize = 96;

/// Fixed part of the data chunk header, before the position array.
pub const DATA_CHUNK_HEADER_BASE: usize = 24;

/// Number of chunk slots reserved in the chunk index.
pub const NR_OF_CHUNK_SLOTS: usize = 4;

/// Table header record at file offset 0 (44 bytes).
///
/// Its hash doubles as the file signature: a mismatch means the input is
/// not a container file at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    /// Format version the file was written with.
    pub version: u32,
    /// Minimum format version required to read the file.
    pub version_max: u32,
    /// Number of columns in the primary chunkset.
    pub nr_of_cols: u32,
    /// Offset of the primary chunkset header, relative to the key index.
    pub primary_chunkset_loc: u64,
    /// Number of key columns.
    pub key_length: u32,
}

impl TableHeader {
    /// Creates a header for a freshly written file.
    pub fn new(nr_of_cols: u32, key_length: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            version_max: FORMAT_VERSION,
            nr_of_cols,
            primary_chunkset_loc: 52 + 4 * key_length as u64,
            key_length,
        }
    }

    /// Serializes the record, computing the leading hash.
    pub fn to_bytes(&self) -> [u8; TABLE_HEADER_SIZE] {
        let mut buf = [0u8; TABLE_HEADER_SIZE];
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        // table flags (12..16) and free bytes (16..24) stay zero
        buf[24..28].copy_from_slice(&self.version_max.to_le_bytes());
        buf[28..32].copy_from_slice(&self.nr_of_cols.to_le_bytes());
        buf[32..40].copy_from_slice(&self.primary_chunkset_loc.to_le_bytes());
        buf[40..44].copy_from_slice(&self.key_length.to_le_bytes());
        let hash = hash64(&buf[8..]);
        buf[0..8].copy_from_slice(&hash.to_le_bytes());
        buf
    }

    /// Parses and validates the record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownFileFormat`] when the signature hash
    /// mismatches and [`StoreError::UpdateRequired`] when the file needs a
    /// newer reader.
    pub fn from_bytes(buf: &[u8; TABLE_HEADER_SIZE]) -> Result<Self> {
        let stored = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        if hash64(&buf[8..]) != stored {
            return Err(StoreError::UnknownFileFormat);
        }

        let version = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let version_max = u32::from_le_bytes(buf[24..28].try_into().unwrap());
        if version_max > FORMAT_VERSION {
            return Err(StoreError::UpdateRequired {
                file: version_max,
                supported: FORMAT_VERSION,
            });
        }

        Ok(Self {
            version,
            version_max,
            nr_of_cols: u32::from_le_bytes(buf[28..32].try_into().unwrap()),
            primary_chunkset_loc: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
            key_length: u32::from_le_bytes(buf[40..44].try_into().unwrap()),
        })
    }
}

/// Key-index record: 0-based key column positions in key order.
///
/// Present only when the table has key columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIndex {
    /// Key column positions, in presentation order.
    pub key_col_pos: Vec<u32>,
}

impl KeyIndex {
    /// Record size in bytes for `key_length` keys.
    pub fn byte_size(key_length: usize) -> usize {
        8 + 4 * key_length
    }

    /// Serializes the record, computing the leading hash.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::byte_size(self.key_col_pos.len())];
        for (i, &pos) in self.key_col_pos.iter().enumerate() {
            buf[8 + 4 * i..12 + 4 * i].copy_from_slice(&(pos as i32).to_le_bytes());
        }
        let hash = hash64(&buf[8..]);
        buf[0..8].copy_from_slice(&hash.to_le_bytes());
        buf
    }

    /// Parses and validates the record.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < 8 || (buf.len() - 8) % 4 != 0 {
            return Err(StoreError::DamagedHeader);
        }
        let stored = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        if hash64(&buf[8..]) != stored {
            return Err(StoreError::DamagedHeader);
        }
        let key_col_pos = buf[8..]
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes(c.try_into().unwrap()) as u32)
            .collect();
        Ok(Self { key_col_pos })
    }
}

/// Chunkset header record (76 + 8·nrOfCols bytes).
///
/// Carries the row count and the four per-column metadata arrays. The
/// chaining fields (next horizontal chunkset, primary/secondary chunkset
/// indexes, column-names position) are reserved and written as zero; a
/// conformant writer emits exactly one chunkset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunksetHeader {
    /// Total rows in the chunkset.
    pub nr_of_rows: u64,
    /// Per-column semantic attributes.
    pub col_attributes: Vec<u16>,
    /// Per-column codec codes (6..=12).
    pub col_types: Vec<u16>,
    /// Per-column base type identifiers.
    pub col_base_types: Vec<u16>,
    /// Per-column scale exponents.
    pub col_scales: Vec<i16>,
}

impl ChunksetHeader {
    /// Record size in bytes for `nr_of_cols` columns.
    pub fn byte_size(nr_of_cols: usize) -> usize {
        CHUNKSET_HEADER_BASE + 8 * nr_of_cols
    }

    /// Serializes the record, computing the leading hash.
    pub fn to_bytes(&self) -> Vec<u8> {
        let n = self.col_types.len();
        let mut buf = vec![0u8; Self::byte_size(n)];
        buf[8..12].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        // chunkset flags (12..16), free bytes (16..32), colNamesPos (32..40),
        // nextHorzChunkSet (40..48), primChunksetIndex (48..56), and
        // secChunksetIndex (56..64) stay zero
        buf[64..72].copy_from_slice(&self.nr_of_rows.to_le_bytes());
        buf[72..76].copy_from_slice(&(n as u32).to_le_bytes());
        for i in 0..n {
            let base = CHUNKSET_HEADER_BASE;
            buf[base + 2 * i..base + 2 * i + 2]
                .copy_from_slice(&self.col_attributes[i].to_le_bytes());
            buf[base + 2 * n + 2 * i..base + 2 * n + 2 * i + 2]
                .copy_from_slice(&self.col_types[i].to_le_bytes());
            buf[base + 4 * n + 2 * i..base + 4 * n + 2 * i + 2]
                .copy_from_slice(&self.col_base_types[i].to_le_bytes());
            buf[base + 6 * n + 2 * i..base + 6 * n + 2 * i + 2]
                .copy_from_slice(&self.col_scales[i].to_le_bytes());
        }
        let hash = hash64(&buf[8..]);
        buf[0..8].copy_from_slice(&hash.to_le_bytes());
        buf
    }

    /// Parses and validates the record.
    pub fn from_bytes(buf: &[u8], nr_of_cols: usize) -> Result<Self> {
        if buf.len() != Self::byte_size(nr_of_cols) {
            return Err(StoreError::DamagedHeader);
        }
        let stored = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        if hash64(&buf[8..]) != stored {
            return Err(StoreError::DamagedHeader);
        }

        let n = nr_of_cols;
        let base = CHUNKSET_HEADER_BASE;
        let read_u16s = |offset: usize| -> Vec<u16> {
            (0..n)
                .map(|i| {
                    u16::from_le_bytes(buf[offset + 2 * i..offset + 2 * i + 2].try_into().unwrap())
                })
                .collect()
        };

        Ok(Self {
            nr_of_rows: u64::from_le_bytes(buf[64..72].try_into().unwrap()),
            col_attributes: read_u16s(base),
            col_types: read_u16s(base + 2 * n),
            col_base_types: read_u16s(base + 4 * n),
            col_scales: (0..n)
                .map(|i| {
                    i16::from_le_bytes(
                        buf[base + 6 * n + 2 * i..base + 6 * n + 2 * i + 2]
                            .try_into()
                            .unwrap(),
                    )
                })
                .collect(),
        })
    }
}

/// Column-names header record (24 bytes).
///
/// The character payload holding the names follows immediately after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColNamesHeader;

impl ColNamesHeader {
    /// Serializes the record, computing the leading hash.
    pub fn to_bytes(&self) -> [u8; COL_NAMES_HEADER_SIZE] {
        let mut buf = [0u8; COL_NAMES_HEADER_SIZE];
        buf[8..12].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        // colNames flags (12..16) and free bytes (16..24) stay zero
        let hash = hash64(&buf[8..]);
        buf[0..8].copy_from_slice(&hash.to_le_bytes());
        buf
    }

    /// Parses and validates the record.
    pub fn from_bytes(buf: &[u8; COL_NAMES_HEADER_SIZE]) -> Result<Self> {
        let stored = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        if hash64(&buf[8..]) != stored {
            return Err(StoreError::DamagedHeader);
        }
        Ok(Self)
    }
}

/// Chunk index record (96 bytes): four slots of chunk position and row
/// count.
///
/// The format reserves four slots for future chunk chaining; a conformant
/// writer fills slot 0 and leaves the rest zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkIndex {
    /// Absolute file offset of each chunk's data chunk header.
    pub chunk_pos: [u64; NR_OF_CHUNK_SLOTS],
    /// Row count of each chunk.
    pub chunk_rows: [u64; NR_OF_CHUNK_SLOTS],
}

impl ChunkIndex {
    /// Serializes the record, computing the leading hash.
    pub fn to_bytes(&self) -> [u8; CHUNK_INDEX_SIZE] {
        let mut buf = [0u8; CHUNK_INDEX_SIZE];
        buf[8..12].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        // index flags (12..16) and free bytes (16..24) stay zero
        buf[24..26].copy_from_slice(&(NR_OF_CHUNK_SLOTS as u16).to_le_bytes());
        // free bytes (26..32) stay zero
        for i in 0..NR_OF_CHUNK_SLOTS {
            buf[32 + 8 * i..40 + 8 * i].copy_from_slice(&self.chunk_pos[i].to_le_bytes());
            buf[64 + 8 * i..72 + 8 * i].copy_from_slice(&self.chunk_rows[i].to_le_bytes());
        }
        let hash = hash64(&buf[8..]);
        buf[0..8].copy_from_slice(&hash.to_le_bytes());
        buf
    }

    /// Parses and validates the record.
    pub fn from_bytes(buf: &[u8; CHUNK_INDEX_SIZE]) -> Result<Self> {
        let stored = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        if hash64(&buf[8..]) != stored {
            return Err(StoreError::DamagedChunkIndex);
        }
        let mut index = Self::default();
        for i in 0..NR_OF_CHUNK_SLOTS {
            index.chunk_pos[i] = u64::from_le_bytes(buf[32 + 8 * i..40 + 8 * i].try_into().unwrap());
            index.chunk_rows[i] =
                u64::from_le_bytes(buf[64 + 8 * i..72 + 8 * i].try_into().unwrap());
        }
        Ok(index)
    }
}

/// Data chunk header (24 + 8·nrOfCols bytes): the absolute file offset at
/// which each column's block stream begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunkHeader {
    /// Per-column payload offsets, strictly increasing.
    pub position_data: Vec<u64>,
}

impl DataChunkHeader {
    /// Record size in bytes for `nr_of_cols` columns.
    pub fn byte_size(nr_of_cols: usize) -> usize {
        DATA_CHUNK_HEADER_BASE + 8 * nr_of_cols
    }

    /// Serializes the record, computing the leading hash.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::byte_size(self.position_data.len())];
        buf[8..12].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        // data chunk flags (12..16) and free bytes (16..24) stay zero
        for (i, &pos) in self.position_data.iter().enumerate() {
            buf[24 + 8 * i..32 + 8 * i].copy_from_slice(&pos.to_le_bytes());
        }
        let hash = hash64(&buf[8..]);
        buf[0..8].copy_from_slice(&hash.to_le_bytes());
        buf
    }

    /// Parses and validates the record.
    pub fn from_bytes(buf: &[u8], nr_of_cols: usize) -> Result<Self> {
        if buf.len() != Self::byte_size(nr_of_cols) {
            return Err(StoreError::DamagedChunkIndex);
        }
        let stored = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        if hash64(&buf[8..]) != stored {
            return Err(StoreError::DamagedChunkIndex);
        }
        let position_data: Vec<u64> = (0..nr_of_cols)
            .map(|i| u64::from_le_bytes(buf[24 + 8 * i..32 + 8 * i].try_into().unwrap()))
            .collect();
        if position_data.windows(2).any(|w| w[0] >= w[1]) {
            return Err(StoreError::DamagedChunkIndex);
        }
        Ok(Self { position_data })
    }
}
