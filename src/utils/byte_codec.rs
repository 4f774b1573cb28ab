//! Little-endian integer codec and bounded region reads.
//!
//! Every SWORD index and data file stores integers little-endian. The helpers here
//! decode them out of byte slices and read `(offset, size)` regions out of data files
//! while tolerating truncated or slightly corrupt modules: an over-long region is
//! clamped to the end of the file and an impossible one reads as empty, with the
//! problem logged instead of returned.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{ByteOrder, LittleEndian};
use log::error;

use crate::{ModuleError, Result};

/// Decodes an unsigned 32-bit little-endian integer at `offset`.
pub fn decode_le32(buf: &[u8], offset: usize) -> Result<u32> {
    let end = offset.checked_add(4).filter(|end| *end <= buf.len()).ok_or_else(|| {
        ModuleError::invalid_data_format(format!(
            "need 4 bytes at offset {} but buffer has {}",
            offset,
            buf.len()
        ))
    })?;
    Ok(LittleEndian::read_u32(&buf[offset..end]))
}

/// Decodes a signed 32-bit little-endian integer at `offset`.
pub fn decode_le32_signed(buf: &[u8], offset: usize) -> Result<i32> {
    Ok(decode_le32(buf, offset)? as i32)
}

/// Decodes an unsigned 16-bit little-endian integer at `offset`.
pub fn decode_le16(buf: &[u8], offset: usize) -> Result<u16> {
    let end = offset.checked_add(2).filter(|end| *end <= buf.len()).ok_or_else(|| {
        ModuleError::invalid_data_format(format!(
            "need 2 bytes at offset {} but buffer has {}",
            offset,
            buf.len()
        ))
    })?;
    Ok(LittleEndian::read_u16(&buf[offset..end]))
}

/// Writes `value` little-endian into `buf` at `offset`.
pub fn encode_le32(buf: &mut [u8], offset: usize, value: u32) -> Result<()> {
    let end = offset.checked_add(4).filter(|end| *end <= buf.len()).ok_or_else(|| {
        ModuleError::invalid_parameter(format!("no room for 4 bytes at offset {}", offset))
    })?;
    LittleEndian::write_u32(&mut buf[offset..end], value);
    Ok(())
}

/// Writes `value` little-endian into `buf` at `offset`.
pub fn encode_le16(buf: &mut [u8], offset: usize, value: u16) -> Result<()> {
    let end = offset.checked_add(2).filter(|end| *end <= buf.len()).ok_or_else(|| {
        ModuleError::invalid_parameter(format!("no room for 2 bytes at offset {}", offset))
    })?;
    LittleEndian::write_u16(&mut buf[offset..end], value);
    Ok(())
}

/// Returns the position of the first `target` byte in `buf`.
pub fn find_byte(buf: &[u8], target: u8) -> Option<usize> {
    buf.iter().position(|b| *b == target)
}

/// Reads `size` bytes starting at `offset`.
///
/// * `size == 0` returns an empty buffer without touching the reader.
/// * A negative size, or an offset at or past the end, logs and returns empty.
/// * A region running past the end logs and is clamped to the available bytes.
pub fn read_region<R: Read + Seek>(reader: &mut R, offset: u64, size: i64) -> Result<Vec<u8>> {
    if size == 0 {
        return Ok(Vec::new());
    }
    if size < 0 {
        error!("Negative region size {} at offset {}", size, offset);
        return Ok(Vec::new());
    }

    let file_len = reader.seek(SeekFrom::End(0))?;
    if offset >= file_len {
        error!("Region offset {} is beyond the file length {}", offset, file_len);
        return Ok(Vec::new());
    }

    let mut size = size as u64;
    if offset + size > file_len {
        error!(
            "Region {}+{} runs past the file length {}, clamping to {} bytes",
            offset,
            size,
            file_len,
            file_len - offset
        );
        size = file_len - offset;
    }

    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; size as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}
