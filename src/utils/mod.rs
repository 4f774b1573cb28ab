// Utility functions and helpers
//
// This module provides the little-endian codec and region reads, charset
// decoding, and block compression used by every backend.

pub mod byte_codec;
pub mod compression;
pub mod lzss;
pub mod text;

pub use byte_codec::{
    decode_le16, decode_le32, decode_le32_signed, encode_le16, encode_le32, find_byte, read_region,
};
pub use compression::{get_compressor, CompressionMethod, Compressor};
pub use text::{decode_text, encode_text, Charset};
