//! Block streamer: fixed-element-count compressed blocks with random access.
//!
//! A stream turns a raw element buffer into a self-describing sequence of
//! independently compressed blocks, and back. Because every block records
//! its compressed size and algorithm up front, a reader can locate and
//! decompress exactly the blocks spanning a requested element range without
//! scanning what precedes them.
//!
//! ## Stream layout
//!
//! All integers little-endian, offsets relative to the stream start:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Stream header (24 bytes)                                    │
//! │  - n_elements: u64                                           │
//! │  - element_size: u32 (bytes per element)                     │
//! │  - block_size: u32 (elements per block)                      │
//! │  - n_blocks: u32 = ceil(n_elements / block_size)             │
//! │  - reserved: 4 bytes                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Block table (8 bytes per block)                             │
//! │  - compressed_size: u32, algo: u16, reserved: u16            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Block payloads, contiguous                                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Annotation: length: u32 + UTF-8 bytes                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The final block may hold fewer than `block_size` elements; its raw size
//! is the remainder. A zero-element stream has an empty block table and
//! carries only its annotation.

pub mod compressor;

use crate::error::{Result, StoreError};
use std::io::{Read, Seek, SeekFrom, Write};

pub use compressor::CompAlgo;

/// Stream header size in bytes.
pub const STREAM_HEADER_SIZE: usize = 24;

/// Size of one block table entry in bytes.
pub const BLOCK_ENTRY_SIZE: usize = 8;

/// ZSTD level applied by the composite policy's second stage.
const ZSTD_COMPOSITE_LEVEL: i32 = 20;

/// LZ4 level applied to every block under the composite policy.
const LZ4_COMPOSITE_LEVEL: i32 = 100;

/// Denominator of the deterministic block-selection fraction.
const POLICY_DENOMINATOR: u32 = 50;

/// Per-block compression policy derived from the 0..=100 setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPolicy {
    /// Every block stored verbatim.
    Plain,
    /// A deterministic `num`-in-50 fraction of blocks LZ4-compressed at
    /// `level`, the rest verbatim.
    LinearMix {
        /// LZ4 effort level (twice the compression setting).
        level: i32,
        /// Numerator of the compressed-block fraction over 50.
        num: u32,
    },
    /// Every block LZ4-compressed; a deterministic `num`-in-50 fraction gets
    /// an additional ZSTD stage.
    Composite {
        /// Numerator of the two-stage fraction over 50.
        num: u32,
    },
}

impl StreamPolicy {
    /// Maps a compression setting onto a policy.
    ///
    /// 0 is uncompressed; 1..=50 mixes verbatim and LZ4 blocks so the
    /// compressed fraction equals `setting/50`; 51..=100 compresses every
    /// block with LZ4 and layers ZSTD level 20 over a `(setting-50)/50`
    /// fraction. Settings above 100 behave as 100.
    pub fn from_setting(compress: u8) -> Self {
        match compress.min(100) {
            0 => Self::Plain,
            c @ 1..=50 => Self::LinearMix {
                level: 2 * c as i32,
                num: c as u32,
            },
            c => Self::Composite {
                num: c as u32 - 50,
            },
        }
    }
}

/// Deterministic block-by-block algorithm chooser for a policy.
///
/// Selection is driven by an accumulator over the block index, so the same
/// policy always marks the same blocks; readers never need this because the
/// chosen algorithm is persisted per block.
struct PolicyCursor {
    policy: StreamPolicy,
    acc: u32,
}

impl PolicyCursor {
    fn new(policy: StreamPolicy) -> Self {
        Self { policy, acc: 0 }
    }

    fn next(&mut self) -> (CompAlgo, i32) {
        match self.policy {
            StreamPolicy::Plain => (CompAlgo::None, 0),
            StreamPolicy::LinearMix { level, num } => {
                self.acc += num;
                if self.acc >= POLICY_DENOMINATOR {
                    self.acc -= POLICY_DENOMINATOR;
                    (CompAlgo::Lz4, level)
                } else {
                    (CompAlgo::None, 0)
                }
            }
            StreamPolicy::Composite { num } => {
                self.acc += num;
                if self.acc >= POLICY_DENOMINATOR {
                    self.acc -= POLICY_DENOMINATOR;
                    (CompAlgo::Lz4Zstd, ZSTD_COMPOSITE_LEVEL)
                } else {
                    (CompAlgo::Lz4, LZ4_COMPOSITE_LEVEL)
                }
            }
        }
    }
}

/// Per-block accounting entry in the stream's block table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEntry {
    /// Compressed payload size in bytes.
    pub compressed_size: u32,
    /// Compression applied to this block.
    pub algo: CompAlgo,
}

/// Parsed stream header and block table, with derived offsets.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Total logical elements in the stream.
    pub n_elements: u64,
    /// Bytes per element.
    pub element_size: u32,
    /// Elements per block.
    pub block_size: u32,
    /// Per-block size and algorithm table.
    pub entries: Vec<BlockEntry>,
    /// Absolute file offset of the first block payload.
    pub data_start: u64,
}

impl StreamInfo {
    /// Absolute offset of block `idx`'s payload.
    fn block_offset(&self, idx: usize) -> u64 {
        let preceding: u64 = self.entries[..idx]
            .iter()
            .map(|e| e.compressed_size as u64)
            .sum();
        self.data_start + preceding
    }

    /// Number of elements in block `idx` (the final block may be partial).
    fn block_elements(&self, idx: usize) -> u64 {
        let first = idx as u64 * self.block_size as u64;
        (self.n_elements - first).min(self.block_size as u64)
    }

    /// Raw (uncompressed) size of block `idx` in bytes.
    fn raw_block_size(&self, idx: usize) -> usize {
        (self.block_elements(idx) * self.element_size as u64) as usize
    }

    /// Absolute offset of the annotation length field.
    pub fn annotation_pos(&self) -> u64 {
        self.block_offset(self.entries.len())
    }
}

/// Writes `buf` as a compressed block stream followed by `annotation`.
///
/// `buf` must hold exactly `n_elements * element_size` bytes. The stream is
/// assembled strictly sequentially; block payloads are buffered in memory so
/// the block table can precede them without a seek-back.
pub fn write_stream<W: Write>(
    writer: &mut W,
    buf: &[u8],
    n_elements: u64,
    element_size: u32,
    block_size: u32,
    policy: StreamPolicy,
    annotation: &str,
) -> Result<()> {
    debug_assert_eq!(buf.len() as u64, n_elements * element_size as u64);
    debug_assert!(element_size > 0 && block_size > 0);

    let n_blocks = n_elements.div_ceil(block_size as u64) as u32;
    let block_bytes = block_size as usize * element_size as usize;

    let mut cursor = PolicyCursor::new(policy);
    let mut table = Vec::with_capacity(n_blocks as usize * BLOCK_ENTRY_SIZE);
    let mut payload = Vec::new();

    for chunk in buf.chunks(block_bytes) {
        let (algo, level) = cursor.next();
        let compressed = compressor::compress(algo, chunk, level)?;
        table.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        table.extend_from_slice(&(algo as u16).to_le_bytes());
        table.extend_from_slice(&0u16.to_le_bytes());
        payload.extend_from_slice(&compressed);
    }

    let mut header = [0u8; STREAM_HEADER_SIZE];
    header[0..8].copy_from_slice(&n_elements.to_le_bytes());
    header[8..12].copy_from_slice(&element_size.to_le_bytes());
    header[12..16].copy_from_slice(&block_size.to_le_bytes());
    header[16..20].copy_from_slice(&n_blocks.to_le_bytes());

    writer.write_all(&header)?;
    writer.write_all(&table)?;
    writer.write_all(&payload)?;
    writer.write_all(&(annotation.len() as u32).to_le_bytes())?;
    writer.write_all(annotation.as_bytes())?;
    Ok(())
}

/// Parses the stream header and block table at absolute offset `pos`.
pub fn read_stream_info<R: Read + Seek>(reader: &mut R, pos: u64) -> Result<StreamInfo> {
    reader.seek(SeekFrom::Start(pos))?;

    let mut header = [0u8; STREAM_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let n_elements = u64::from_le_bytes(header[0..8].try_into().unwrap());
    let element_size = u32::from_le_bytes(header[8..12].try_into().unwrap());
    let block_size = u32::from_le_bytes(header[12..16].try_into().unwrap());
    let n_blocks = u32::from_le_bytes(header[16..20].try_into().unwrap());

    if element_size == 0 || block_size == 0 {
        return Err(StoreError::DamagedHeader);
    }
    if n_blocks as u64 != n_elements.div_ceil(block_size as u64) {
        return Err(StoreError::DamagedHeader);
    }

    let mut table = vec![0u8; n_blocks as usize * BLOCK_ENTRY_SIZE];
    reader.read_exact(&mut table)?;

    let mut entries = Vec::with_capacity(n_blocks as usize);
    for entry in table.chunks_exact(BLOCK_ENTRY_SIZE) {
        let compressed_size = u32::from_le_bytes(entry[0..4].try_into().unwrap());
        let algo_code = u16::from_le_bytes(entry[4..6].try_into().unwrap());
        let algo = CompAlgo::from_u16(algo_code)
            .ok_or(StoreError::UnknownCompression(algo_code))?;
        entries.push(BlockEntry {
            compressed_size,
            algo,
        });
    }

    Ok(StreamInfo {
        n_elements,
        element_size,
        block_size,
        entries,
        data_start: pos + STREAM_HEADER_SIZE as u64 + n_blocks as u64 * BLOCK_ENTRY_SIZE as u64,
    })
}

/// Reads elements `[start_elem, start_elem + length)` into a contiguous
/// buffer, decompressing only the blocks spanning that range.
pub fn read_stream<R: Read + Seek>(
    reader: &mut R,
    info: &StreamInfo,
    start_elem: u64,
    length: u64,
) -> Result<Vec<u8>> {
    if length == 0 {
        return Ok(Vec::new());
    }
    if start_elem + length > info.n_elements {
        return Err(StoreError::DamagedHeader);
    }

    let bs = info.block_size as u64;
    let es = info.element_size as u64;
    let first_block = (start_elem / bs) as usize;
    let last_block = ((start_elem + length - 1) / bs) as usize;

    let mut out = Vec::with_capacity((length * es) as usize);
    reader.seek(SeekFrom::Start(info.block_offset(first_block)))?;

    for idx in first_block..=last_block {
        let entry = info.entries[idx];
        let mut compressed = vec![0u8; entry.compressed_size as usize];
        reader.read_exact(&mut compressed)?;
        let raw = compressor::decompress(entry.algo, &compressed, info.raw_block_size(idx))?;

        let block_first = idx as u64 * bs;
        let begin = start_elem.max(block_first) - block_first;
        let end = (start_elem + length).min(block_first + info.block_elements(idx)) - block_first;
        out.extend_from_slice(&raw[(begin * es) as usize..(end * es) as usize]);
    }
    Ok(out)
}

/// Reads the trailing annotation, returning it together with the absolute
/// offset one past the stream's end.
pub fn read_annotation<R: Read + Seek>(reader: &mut R, info: &StreamInfo) -> Result<(String, u64)> {
    let pos = info.annotation_pos();
    reader.seek(SeekFrom::Start(pos))?;

    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    let annotation = String::from_utf8(bytes).map_err(|_| StoreError::DamagedHeader)?;
    Ok((annotation, pos + 4 + len as u64))
}
