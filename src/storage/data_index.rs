//! Fixed-width `(offset, size)` index records.
//!
//! Every index file in a SWORD module is an array of records that start with a
//! 4-byte offset followed by a 2- or 4-byte size, all little-endian. The record for
//! ordinal `n` lives at byte `n * record_len`.

use std::io::{Read, Seek, SeekFrom, Write};

use log::warn;

use crate::utils::byte_codec::{decode_le16, decode_le32, encode_le16, encode_le32, read_region};
use crate::Result;

/// Width of the size field in an index record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeWidth {
    U16,
    U32,
}

impl SizeWidth {
    pub fn bytes(&self) -> usize {
        match self {
            SizeWidth::U16 => 2,
            SizeWidth::U32 => 4,
        }
    }

    /// Length of a whole `(offset, size)` record.
    pub fn record_len(&self) -> usize {
        4 + self.bytes()
    }
}

/// Location of an entry's bytes in a data file.
///
/// A size of zero means the entry has no data. A negative size can only come from
/// a corrupt 4-byte size field and is treated as empty by readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct DataIndex {
    pub offset: u32,
    pub size: i32,
}

impl DataIndex {
    pub fn new(offset: u32, size: i32) -> Self {
        Self { offset, size }
    }

    pub fn is_empty(&self) -> bool {
        self.size <= 0
    }

    /// Decodes the record starting at `pos` in `buf`.
    pub fn decode(buf: &[u8], pos: usize, width: SizeWidth) -> Result<Self> {
        let offset = decode_le32(buf, pos)?;
        let size = match width {
            SizeWidth::U16 => decode_le16(buf, pos + 4)? as i32,
            SizeWidth::U32 => decode_le32(buf, pos + 4)? as i32,
        };
        Ok(Self { offset, size })
    }

    pub fn encode(&self, width: SizeWidth) -> Result<Vec<u8>> {
        let mut record = vec![0u8; width.record_len()];
        encode_le32(&mut record, 0, self.offset)?;
        match width {
            SizeWidth::U16 => encode_le16(&mut record, 4, self.size.clamp(0, u16::MAX as i32) as u16)?,
            SizeWidth::U32 => encode_le32(&mut record, 4, self.size as u32)?,
        }
        Ok(record)
    }

    /// Reads record number `ordinal` from an index file.
    ///
    /// A record that is missing or cut short by the end of the file reads as empty.
    pub fn read_record<R: Read + Seek>(reader: &mut R, ordinal: u64, width: SizeWidth) -> Result<Self> {
        let record_len = width.record_len();
        let buf = read_region(reader, ordinal * record_len as u64, record_len as i64)?;
        if buf.len() < record_len {
            if !buf.is_empty() {
                warn!("Index record {} is truncated to {} bytes", ordinal, buf.len());
            }
            return Ok(DataIndex::default());
        }
        Self::decode(&buf, 0, width)
    }

    /// Overwrites record number `ordinal` in an index file.
    pub fn write_record<W: Write + Seek>(&self, writer: &mut W, ordinal: u64, width: SizeWidth) -> Result<()> {
        let record = self.encode(width)?;
        writer.seek(SeekFrom::Start(ordinal * width.record_len() as u64))?;
        writer.write_all(&record)?;
        Ok(())
    }
}
