//! Typed column codecs over the block streamer.
//!
//! Each codec fixes an element size and block size for its type and
//! delegates the actual block work to [`crate::stream`]. The character
//! codec is the odd one out: it writes a size-meta stream (cumulative u32
//! end offsets) followed by a byte stream of the packed string data, with a
//! small sub-header carrying the encoding tag. Factor columns compose the
//! int32 and character codecs.

use crate::column::StringEncoding;
use crate::error::{Result, StoreError};
use crate::stream::{self, StreamPolicy};
use std::io::{Read, Seek, SeekFrom, Write};

/// Elements per block for int32 streams.
pub(crate) const BLOCKSIZE_INT32: u32 = 4096;

/// Elements per block for double streams.
pub(crate) const BLOCKSIZE_DOUBLE: u32 = 2048;

/// Elements per block for int64 streams.
pub(crate) const BLOCKSIZE_INT64: u32 = 2048;

/// Elements per block for byte streams.
pub(crate) const BLOCKSIZE_BYTE: u32 = 16384;

/// Packed bytes (4 logical values each) per block for logical streams.
pub(crate) const BLOCKSIZE_LOGICAL: u32 = 4096;

/// Size-meta entries per block for character streams.
pub(crate) const BLOCKSIZE_CHAR_META: u32 = 4096;

/// String bytes per block for character streams.
pub(crate) const BLOCKSIZE_CHAR_DATA: u32 = 16384;

// --- int32 ---------------------------------------------------------------

pub(crate) fn write_int32<W: Write>(
    writer: &mut W,
    values: &[i32],
    compress: u8,
    annotation: &str,
) -> Result<()> {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    stream::write_stream(
        writer,
        &buf,
        values.len() as u64,
        4,
        BLOCKSIZE_INT32,
        StreamPolicy::from_setting(compress),
        annotation,
    )
}

pub(crate) fn read_int32<R: Read + Seek>(
    reader: &mut R,
    pos: u64,
    start_row: u64,
    length: u64,
    total: u64,
) -> Result<(Vec<i32>, String)> {
    let info = stream::read_stream_info(reader, pos)?;
    if info.element_size != 4 || info.n_elements != total {
        return Err(StoreError::DamagedHeader);
    }
    let raw = stream::read_stream(reader, &info, start_row, length)?;
    let values = raw
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    let (annotation, _) = stream::read_annotation(reader, &info)?;
    Ok((values, annotation))
}

// --- double --------------------------------------------------------------

pub(crate) fn write_double<W: Write>(
    writer: &mut W,
    values: &[f64],
    compress: u8,
    annotation: &str,
) -> Result<()> {
    let mut buf = Vec::with_capacity(values.len() * 8);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    stream::write_stream(
        writer,
        &buf,
        values.len() as u64,
        8,
        BLOCKSIZE_DOUBLE,
        StreamPolicy::from_setting(compress),
        annotation,
    )
}

pub(crate) fn read_double<R: Read + Seek>(
    reader: &mut R,
    pos: u64,
    start_row: u64,
    length: u64,
    total: u64,
) -> Result<(Vec<f64>, String)> {
    let info = stream::read_stream_info(reader, pos)?;
    if info.element_size != 8 || info.n_elements != total {
        return Err(StoreError::DamagedHeader);
    }
    let raw = stream::read_stream(reader, &info, start_row, length)?;
    let values = raw
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
        .collect();
    let (annotation, _) = stream::read_annotation(reader, &info)?;
    Ok((values, annotation))
}

// --- int64 ---------------------------------------------------------------

pub(crate) fn write_int64<W: Write>(
    writer: &mut W,
    values: &[i64],
    compress: u8,
    annotation: &str,
) -> Result<()> {
    let mut buf = Vec::with_capacity(values.len() * 8);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    stream::write_stream(
        writer,
        &buf,
        values.len() as u64,
        8,
        BLOCKSIZE_INT64,
        StreamPolicy::from_setting(compress),
        annotation,
    )
}

pub(crate) fn read_int64<R: Read + Seek>(
    reader: &mut R,
    pos: u64,
    start_row: u64,
    length: u64,
    total: u64,
) -> Result<(Vec<i64>, String)> {
    let info = stream::read_stream_info(reader, pos)?;
    if info.element_size != 8 || info.n_elements != total {
        return Err(StoreError::DamagedHeader);
    }
    let raw = stream::read_stream(reader, &info, start_row, length)?;
    let values = raw
        .chunks_exact(8)
        .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
        .collect();
    let (annotation, _) = stream::read_annotation(reader, &info)?;
    Ok((values, annotation))
}

// --- byte ----------------------------------------------------------------

pub(crate) fn write_byte<W: Write>(
    writer: &mut W,
    values: &[u8],
    compress: u8,
    annotation: &str,
) -> Result<()> {
    stream::write_stream(
        writer,
        values,
        values.len() as u64,
        1,
        BLOCKSIZE_BYTE,
        StreamPolicy::from_setting(compress),
        annotation,
    )
}

pub(crate) fn read_byte<R: Read + Seek>(
    reader: &mut R,
    pos: u64,
    start_row: u64,
    length: u64,
    total: u64,
) -> Result<(Vec<u8>, String)> {
    let info = stream::read_stream_info(reader, pos)?;
    if info.element_size != 1 || info.n_elements != total {
        return Err(StoreError::DamagedHeader);
    }
    let values = stream::read_stream(reader, &info, start_row, length)?;
    let (annotation, _) = stream::read_annotation(reader, &info)?;
    Ok((values, annotation))
}

// --- logical -------------------------------------------------------------

/// Packs logical values four to a byte: 00 = false, 01 = true, 10 = missing.
/// Value `j` of a byte occupies bits `2·(j mod 4)` counting from the LSB.
pub(crate) fn write_logical<W: Write>(
    writer: &mut W,
    values: &[i32],
    compress: u8,
    annotation: &str,
) -> Result<()> {
    let packed_len = values.len().div_ceil(4);
    let mut buf = vec![0u8; packed_len];
    for (i, &v) in values.iter().enumerate() {
        let code: u8 = if v == i32::MIN {
            0b10
        } else if v != 0 {
            0b01
        } else {
            0b00
        };
        buf[i / 4] |= code << (2 * (i % 4));
    }
    stream::write_stream(
        writer,
        &buf,
        packed_len as u64,
        1,
        BLOCKSIZE_LOGICAL,
        StreamPolicy::from_setting(compress),
        annotation,
    )
}

pub(crate) fn read_logical<R: Read + Seek>(
    reader: &mut R,
    pos: u64,
    start_row: u64,
    length: u64,
    total: u64,
) -> Result<(Vec<i32>, String)> {
    let info = stream::read_stream_info(reader, pos)?;
    if info.element_size != 1 || info.n_elements != total.div_ceil(4) {
        return Err(StoreError::DamagedHeader);
    }

    let first_byte = start_row / 4;
    let end_byte = (start_row + length).div_ceil(4);
    let raw = stream::read_stream(reader, &info, first_byte, end_byte - first_byte)?;

    let mut values = Vec::with_capacity(length as usize);
    for j in 0..length {
        let offset = start_row + j - first_byte * 4;
        let byte = raw[(offset / 4) as usize];
        let code = (byte >> (2 * (offset % 4))) & 0b11;
        values.push(match code {
            0b00 => 0,
            0b01 => 1,
            // 0b10 is the missing marker; the reserved 0b11 reads as missing
            _ => i32::MIN,
        });
    }
    let (annotation, _) = stream::read_annotation(reader, &info)?;
    Ok((values, annotation))
}

// --- character -----------------------------------------------------------

/// Character sub-header size: encoding tag (u16) plus reserved bytes.
const CHAR_SUBHEADER_SIZE: usize = 4;

/// Outcome of decoding a character payload.
pub(crate) struct CharRead {
    /// Decoded element strings.
    pub values: Vec<String>,
    /// Encoding tag persisted with the column.
    pub encoding: StringEncoding,
    /// Absolute offset one past the payload.
    pub end_pos: u64,
}

pub(crate) fn write_character<W: Write>(
    writer: &mut W,
    values: &[String],
    encoding: StringEncoding,
    compress: u8,
) -> Result<()> {
    writer.write_all(&(encoding as u16).to_le_bytes())?;
    writer.write_all(&0u16.to_le_bytes())?;

    let mut meta = Vec::with_capacity(values.len() * 4);
    let mut bytes = Vec::new();
    for v in values {
        bytes.extend_from_slice(v.as_bytes());
        let end = u32::try_from(bytes.len()).map_err(|_| StoreError::StringDataTooLarge)?;
        meta.extend_from_slice(&end.to_le_bytes());
    }

    let policy = StreamPolicy::from_setting(compress);
    stream::write_stream(
        writer,
        &meta,
        values.len() as u64,
        4,
        BLOCKSIZE_CHAR_META,
        policy,
        "",
    )?;
    stream::write_stream(
        writer,
        &bytes,
        bytes.len() as u64,
        1,
        BLOCKSIZE_CHAR_DATA,
        policy,
        "",
    )
}

/// Decodes elements `[start, start + length)` of a character payload, or
/// the full vector when `range` is `None` (used for factor level labels,
/// whose count only the payload itself knows).
pub(crate) fn read_character<R: Read + Seek>(
    reader: &mut R,
    pos: u64,
    range: Option<(u64, u64)>,
) -> Result<CharRead> {
    reader.seek(SeekFrom::Start(pos))?;
    let mut sub = [0u8; CHAR_SUBHEADER_SIZE];
    reader.read_exact(&mut sub)?;
    let encoding_code = u16::from_le_bytes(sub[0..2].try_into().unwrap());
    let encoding =
        StringEncoding::from_u16(encoding_code).ok_or(StoreError::DamagedHeader)?;

    let meta_info = stream::read_stream_info(reader, pos + CHAR_SUBHEADER_SIZE as u64)?;
    if meta_info.element_size != 4 {
        return Err(StoreError::DamagedHeader);
    }
    let n = meta_info.n_elements;
    let (start, length) = range.unwrap_or((0, n));
    if start + length > n {
        return Err(StoreError::DamagedHeader);
    }

    // Cumulative end offsets for the range, plus the end of the preceding
    // element to anchor the first string's start.
    let fetch_from = start.saturating_sub(1);
    let raw_meta = stream::read_stream(reader, &meta_info, fetch_from, start + length - fetch_from)?;
    let ends: Vec<u32> = raw_meta
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect();

    let (_, data_pos) = stream::read_annotation(reader, &meta_info)?;
    let data_info = stream::read_stream_info(reader, data_pos)?;
    if data_info.element_size != 1 {
        return Err(StoreError::DamagedHeader);
    }

    let first = if start == 0 { 0usize } else { 1usize };
    let byte_start = if start == 0 { 0u64 } else { ends[0] as u64 };
    let byte_end = if length == 0 {
        byte_start
    } else {
        ends[first + length as usize - 1] as u64
    };
    if byte_end < byte_start || byte_end > data_info.n_elements {
        return Err(StoreError::DamagedHeader);
    }

    let data = stream::read_stream(reader, &data_info, byte_start, byte_end - byte_start)?;

    let mut values = Vec::with_capacity(length as usize);
    let mut prev = byte_start;
    for k in 0..length as usize {
        let end = ends[first + k] as u64;
        if end < prev || end > byte_end {
            return Err(StoreError::DamagedHeader);
        }
        let slice = &data[(prev - byte_start) as usize..(end - byte_start) as usize];
        let s = std::str::from_utf8(slice).map_err(|_| StoreError::DamagedHeader)?;
        values.push(s.to_owned());
        prev = end;
    }

    let (_, end_pos) = stream::read_annotation(reader, &data_info)?;
    Ok(CharRead {
        values,
        encoding,
        end_pos,
    })
}

// --- factor --------------------------------------------------------------

pub(crate) fn write_factor<W: Write>(
    writer: &mut W,
    levels: &[i32],
    labels: &[String],
    encoding: StringEncoding,
    compress: u8,
    annotation: &str,
) -> Result<()> {
    write_int32(writer, levels, compress, annotation)?;
    write_character(writer, labels, encoding, compress)
}

pub(crate) fn read_factor<R: Read + Seek>(
    reader: &mut R,
    pos: u64,
    start_row: u64,
    length: u64,
    total: u64,
) -> Result<(Vec<i32>, Vec<String>, StringEncoding, String)> {
    let info = stream::read_stream_info(reader, pos)?;
    if info.element_size != 4 || info.n_elements != total {
        return Err(StoreError::DamagedHeader);
    }
    let raw = stream::read_stream(reader, &info, start_row, length)?;
    let levels = raw
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    let (annotation, labels_pos) = stream::read_annotation(reader, &info)?;
    let labels = read_character(reader, labels_pos, None)?;
    Ok((levels, labels.values, labels.encoding, annotation))
}
