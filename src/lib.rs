//! # sword-module - SWORD Module Backend Reader
//!
//! This crate reads the on-disk formats of SWORD modules: Bibles, commentaries,
//! lexicons and generic books distributed as sets of small index and data files.
//! Given a key (a verse, a dictionary headword or a tree path) a backend locates
//! the bytes stored for it, undoing block compression and encipherment.
//!
//! ## Features
//!
//! - **Verse modules**: `RawText`/`RawCom` (and the `4` variants), `zText`/`zCom`, `RawFiles`
//! - **Dictionaries**: `RawLD`, `RawLD4` and `zLD`, with `@LINK` resolution,
//!   Strong's number and daily devotional lookups
//! - **Generic books**: `RawGenBook` node trees with an optional body file
//! - **Compression**: Zip (zlib), Bzip2, Xz and LZSS blocks
//! - **Encipherment**: Sapphire II stream cipher keyed per module
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sword_module::{open_backend, Key, ModuleConfig};
//! use sword_module::keys::OrdinalVersification;
//!
//! # fn main() -> sword_module::Result<()> {
//! let config = ModuleConfig::from_json(
//!     r#"{"Name": "KJV", "ModDrv": "zText", "DataPath": "/usr/share/sword/modules/texts/ztext/kjv",
//!         "CompressType": "ZIP", "BlockType": "BOOK", "Encoding": "UTF-8"}"#,
//! )?;
//! let v11n = Arc::new(OrdinalVersification::new("KJV", 23145, 7957));
//! let backend = open_backend(config, v11n.clone())?;
//! println!("{}", backend.get_raw_text(&Key::Verse(v11n.key(3)))?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Backends**: [`backends`] implements one [`Backend`] per on-disk layout
//! - **Keys**: [`keys`] holds verse, dictionary and tree keys and the versification seam
//! - **Configuration**: [`config`] describes a module (driver, paths, charset, compression)
//! - **Storage**: [`storage`] has index records, the block cache and lazy file handles
//! - **Cryptography**: [`crypto`] for module ciphers
//! - **Utilities**: [`utils`] for byte codecs, compression and text decoding
//!
//! ## Error Handling
//!
//! All fallible operations return a [`Result<T>`] type, where errors are represented by
//! [`ModuleError`]. The crate uses the `snafu` library for ergonomic error handling with
//! context and backtraces.
//!
//! ```
//! use sword_module::{Result, ModuleError};
//!
//! fn example() -> Result<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod backends;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod storage;
pub mod utils;

// Re-export commonly used types for convenience
pub use backends::{open_backend, Backend};
pub use config::{BookType, ModuleConfig};
pub use keys::{IndexKey, Key, KeyList, TreeKey, VerseKey, Versification};

// Re-export error types for convenience
pub use error::{ModuleError, Result, snafu};
