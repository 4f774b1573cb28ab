//! Block compression support for compressed SWORD modules.
//!
//! This module provides a unified interface over the compression types a module
//! descriptor may name in `CompressType`:
//! - ZIP (zlib streams)
//! - BZIP2
//! - XZ
//! - LZSS (SWORD's own ring-buffer scheme, read only)

use std::io::{Read, Write};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use serde::{Deserialize, Serialize};

use crate::utils::lzss;
use crate::{ModuleError, Result};

/// Compression methods a compressed module may use for its blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompressionMethod {
    /// zlib compression (the default for zText, zCom and zLD modules)
    #[default]
    Zip,
    Bzip2,
    Xz,
    /// Legacy LZSS compression
    Lzss,
}

impl CompressionMethod {
    /// Parses the value of a `CompressType` descriptor entry.
    pub fn from_label(label: &str) -> Result<Self> {
        match label.trim().to_uppercase().as_str() {
            "ZIP" => Ok(CompressionMethod::Zip),
            "BZIP2" => Ok(CompressionMethod::Bzip2),
            "XZ" => Ok(CompressionMethod::Xz),
            "LZSS" => Ok(CompressionMethod::Lzss),
            _ => Err(ModuleError::invalid_parameter(format!("Invalid compression method:{}", label))),
        }
    }
}

/// Common interface for compression and decompression operations.
pub trait Compressor: Send + Sync {
    /// Compresses the input data.
    ///
    /// # Errors
    ///
    /// Returns an error if compression fails or the method is read-only.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompresses the input data.
    ///
    /// # Arguments
    ///
    /// * `data` - The compressed data
    /// * `expected_size` - The uncompressed size when the module records one
    ///
    /// # Errors
    ///
    /// Returns an error if decompression fails or the output size doesn't match.
    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>>;
}

fn check_size(method: &str, decompressed: Vec<u8>, expected_size: Option<usize>) -> Result<Vec<u8>> {
    match expected_size {
        Some(expected) if expected != decompressed.len() => Err(ModuleError::decompression_error(format!(
            "{}: expected size {} but got {}",
            method,
            expected,
            decompressed.len()
        ))),
        _ => Ok(decompressed),
    }
}

/// Deflate (zlib) compression implementation.
pub struct ZipCompressor;

impl Compressor for ZipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)
            .map_err(|e| ModuleError::compression_error(format!("Deflate error: {}", e)))?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut decompressed = Vec::with_capacity(expected_size.unwrap_or(data.len() * 4));
        decoder.read_to_end(&mut decompressed)
            .map_err(|e| ModuleError::decompression_error(format!("Inflate error: {}", e)))?;
        check_size("Inflate", decompressed, expected_size)
    }
}

pub struct Bzip2Compressor;

impl Compressor for Bzip2Compressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(data)
            .map_err(|e| ModuleError::compression_error(format!("Bzip2 Err:{}", e)))?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        let mut decoder = bzip2::read::BzDecoder::new(data);
        let mut decompressed = Vec::with_capacity(expected_size.unwrap_or(data.len() * 4));
        decoder.read_to_end(&mut decompressed)
            .map_err(|e| ModuleError::decompression_error(format!("Bzip2 Err:{}", e)))?;
        check_size("Bzip2", decompressed, expected_size)
    }
}

/// XZ compression implementation.
pub struct XzCompressor;

impl Compressor for XzCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut compressed = Vec::new();
        lzma_rs::xz_compress(&mut std::io::Cursor::new(data), &mut compressed)
            .map_err(|e| ModuleError::compression_error(format!("Xz Err:{}", e)))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        let mut decompressed = Vec::with_capacity(expected_size.unwrap_or(data.len() * 4));
        lzma_rs::xz_decompress(&mut std::io::Cursor::new(data), &mut decompressed)
            .map_err(|e| ModuleError::decompression_error(format!("Xz Err:{}", e)))?;
        check_size("Xz", decompressed, expected_size)
    }
}

pub struct LzssCompressor;

impl Compressor for LzssCompressor {
    fn compress(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Err(ModuleError::unsupported("LZSS compression is read only"))
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        check_size("Lzss", lzss::decode(data), expected_size)
    }
}

pub fn get_compressor(method: CompressionMethod) -> Box<dyn Compressor> {
    match method {
        CompressionMethod::Zip => Box::new(ZipCompressor),
        CompressionMethod::Bzip2 => Box::new(Bzip2Compressor),
        CompressionMethod::Xz => Box::new(XzCompressor),
        CompressionMethod::Lzss => Box::new(LzssCompressor),
    }
}
