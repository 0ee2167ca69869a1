//! Compression primitives for the block streamer.
//!
//! Two external byte codecs (LZ4 and ZSTD) behind a single
//! compress/decompress contract, plus the two-stage composite used by the
//! high end of the compression range. Each block records which of these was
//! applied, so decompression dispatches on the stored identifier and never
//! re-derives the write-time policy.

use crate::error::{Result, StoreError};

/// Identifier of the compression applied to a single block.
///
/// Persisted per block as a `u16`; variants are only added at the end so
/// older files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum CompAlgo {
    /// Block stored verbatim.
    #[default]
    None = 0,
    /// LZ4 block compression.
    Lz4 = 1,
    /// ZSTD compression.
    Zstd = 2,
    /// LZ4 followed by a ZSTD stage over the LZ4 output.
    Lz4Zstd = 3,
}

impl CompAlgo {
    /// Creates a CompAlgo from its on-disk identifier.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Lz4),
            2 => Some(Self::Zstd),
            3 => Some(Self::Lz4Zstd),
            _ => None,
        }
    }
}

/// Compresses `src` with `algo`.
///
/// `level` applies to the ZSTD stages (1..=22). The LZ4 block codec has a
/// single effort setting, so for pure LZ4 the level is accepted for policy
/// bookkeeping but does not alter the output.
pub(crate) fn compress(algo: CompAlgo, src: &[u8], level: i32) -> Result<Vec<u8>> {
    match algo {
        CompAlgo::None => Ok(src.to_vec()),
        CompAlgo::Lz4 => Ok(lz4_flex::compress(src)),
        CompAlgo::Zstd => {
            zstd::bulk::compress(src, level).map_err(|e| StoreError::CompressionError(e.to_string()))
        }
        CompAlgo::Lz4Zstd => {
            let lz4 = lz4_flex::compress(src);
            zstd::bulk::compress(&lz4, level)
                .map_err(|e| StoreError::CompressionError(e.to_string()))
        }
    }
}

/// Decompresses `src` back to exactly `expected` bytes.
pub(crate) fn decompress(algo: CompAlgo, src: &[u8], expected: usize) -> Result<Vec<u8>> {
    let out = match algo {
        CompAlgo::None => src.to_vec(),
        CompAlgo::Lz4 => lz4_flex::decompress(src, expected)
            .map_err(|e| StoreError::DecompressionError(e.to_string()))?,
        CompAlgo::Zstd => zstd::bulk::decompress(src, expected)
            .map_err(|e| StoreError::DecompressionError(e.to_string()))?,
        CompAlgo::Lz4Zstd => {
            // The intermediate LZ4 image can only be as large as the worst
            // case LZ4 expansion of the raw block.
            let bound = lz4_flex::block::get_maximum_output_size(expected);
            let lz4 = zstd::bulk::decompress(src, bound)
                .map_err(|e| StoreError::DecompressionError(e.to_string()))?;
            lz4_flex::decompress(&lz4, expected)
                .map_err(|e| StoreError::DecompressionError(e.to_string()))?
        }
    };
    if out.len() != expected {
        return Err(StoreError::DecompressionError(format!(
            "expected {} bytes, got {}",
            expected,
            out.len()
        )));
    }
    Ok(out)
}
