//! Helper functions for decoding and encoding module text.
//!
//! A SWORD module declares one charset for all of its text: either UTF-8 or the
//! legacy Latin-1 family, which is read as Windows-1252. Legacy modules
//! frequently carry stray control bytes that are scrubbed to spaces before decoding.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{ModuleError, Result};

/// Character set declared by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Charset {
    /// Latin-1, decoded as its Windows-1252 superset
    #[default]
    #[serde(alias = "Latin-1", alias = "LATIN-1", alias = "WINDOWS-1252", alias = "cp1252")]
    Latin1,
    #[serde(alias = "UTF-8", alias = "utf-8", alias = "UTF8")]
    Utf8,
}

impl Charset {
    /// Gets a charset by its label string.
    ///
    /// # Errors
    ///
    /// Returns an error if the label names neither UTF-8 nor a Latin-1 variant.
    pub fn from_label(label: &str) -> Result<Self> {
        match label.trim().to_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Charset::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "windows-1252" | "cp1252" => Ok(Charset::Latin1),
            other => match Encoding::for_label(other.as_bytes()) {
                Some(enc) if enc == UTF_8 => Ok(Charset::Utf8),
                Some(enc) if enc == WINDOWS_1252 => Ok(Charset::Latin1),
                _ => Err(ModuleError::invalid_parameter(format!("Invalid encoding: {}", label))),
            },
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        match self {
            Charset::Latin1 => WINDOWS_1252,
            Charset::Utf8 => UTF_8,
        }
    }
}

/// Bytes that Windows-1252 leaves undefined or that are unwanted controls.
fn is_scrubbed_byte(b: u8) -> bool {
    match b {
        0x09 | 0x0a | 0x0d => false,
        0x00..=0x1f => true,
        0x81 | 0x8d | 0x8f | 0x90 | 0x9d => true,
        _ => false,
    }
}

/// Decodes the text stored for `key` using the module charset.
///
/// Never fails. Undecodable sequences become replacement characters, and for
/// Latin-1 modules each control or undefined byte is replaced by a space and
/// logged against the key.
pub fn decode_text(key: &str, bytes: &[u8], charset: Charset) -> String {
    match charset {
        Charset::Latin1 => {
            let mut scrubbed: Option<Vec<u8>> = None;
            for (i, b) in bytes.iter().enumerate() {
                if is_scrubbed_byte(*b) {
                    warn!("Illegal character 0x{:02x} at position {} in entry {}", b, i, key);
                    scrubbed.get_or_insert_with(|| bytes.to_vec())[i] = b' ';
                }
            }
            let source = scrubbed.as_deref().unwrap_or(bytes);
            let (decoded, _, had_errors) = WINDOWS_1252.decode(source);
            if had_errors {
                debug!("Decoding error with: {} for {}", WINDOWS_1252.name(), key);
            }
            decoded.into_owned()
        }
        Charset::Utf8 => {
            let (decoded, had_errors) = UTF_8.decode_with_bom_removal(bytes);
            if had_errors {
                warn!("Invalid UTF-8 in entry {}, decoded lossily", key);
            }
            decoded.into_owned()
        }
    }
}

/// Encodes text for storage in a module of the given charset.
pub fn encode_text(text: &str, charset: Charset) -> Vec<u8> {
    match charset {
        Charset::Utf8 => text.as_bytes().to_vec(),
        Charset::Latin1 => {
            let (encoded, _, had_errors) = WINDOWS_1252.encode(text);
            if had_errors {
                debug!("Encoding error with: {}", WINDOWS_1252.name());
            }
            encoded.into_owned()
        }
    }
}
