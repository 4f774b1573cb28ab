//! Module backends.
//!
//! A backend turns a key into the text stored for it in one of SWORD's on-disk
//! layouts. All of them share the [`Backend`] contract:
//!
//! - [`RawBackend`]: uncompressed verse text (`RawText`, `RawCom` and their `4` variants)
//! - [`ZVerseBackend`]: block-compressed verse text (`zText`, `zCom`)
//! - [`RawFileBackend`]: one file per verse, writable (`RawFiles`)
//! - [`RawLDBackend`]: uncompressed dictionaries (`RawLD`, `RawLD4`)
//! - [`ZLDBackend`]: block-compressed dictionaries (`zLD`)
//! - [`GenBookBackend`]: hierarchical generic books (`RawGenBook`)
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use sword_module::backends::open_backend;
//! use sword_module::config::{BookType, ModuleConfig};
//! use sword_module::keys::{Key, OrdinalVersification};
//!
//! # fn main() -> sword_module::Result<()> {
//! let v11n = Arc::new(OrdinalVersification::new("KJV", 23145, 7957));
//! let config = ModuleConfig::new("KJV", BookType::ZText, "/usr/share/sword/modules/texts/ztext/kjv");
//! let backend = open_backend(config, v11n.clone())?;
//! let text = backend.get_raw_text(&Key::Verse(v11n.key(3)))?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```

pub mod dictionary;
pub mod genbook;
pub mod module_context;
pub mod raw_file;
pub mod raw_ld;
pub mod raw_verse;
pub mod tree_key_index;
pub mod zld;
pub mod zverse;

use std::sync::Arc;

use crate::config::{BookType, ModuleConfig};
use crate::keys::{Key, KeyList, Versification};
use crate::storage::ReadStatsSnapshot;
use crate::{ModuleError, Result};

pub use genbook::GenBookBackend;
pub use module_context::ModuleContext;
pub use raw_file::RawFileBackend;
pub use raw_ld::RawLDBackend;
pub use raw_verse::RawBackend;
pub use tree_key_index::{TreeKeyIndex, TreeNode};
pub use zld::ZLDBackend;
pub use zverse::ZVerseBackend;

/// Uniform access to the entries of one module.
///
/// Backends are `Send + Sync`; each guards its open files and its block cache
/// with its own lock, so calls on one instance are serialized.
pub trait Backend: Send + Sync {
    fn context(&self) -> &ModuleContext;

    /// Opens the module files. Idempotent.
    fn activate(&self) -> Result<()>;

    /// Closes the module files and drops cached blocks. Idempotent.
    ///
    /// A later lookup reopens the files transparently.
    fn deactivate(&self);

    fn is_active(&self) -> bool;

    /// Enumerates every key that has stored data.
    fn read_index(&self) -> Result<KeyList>;

    /// Whether the key has stored data. Reads index records only.
    fn contains(&self, key: &Key) -> bool;

    /// The stored bytes for `key`, deciphered and decompressed but not decoded.
    fn get_raw_bytes(&self, key: &Key) -> Result<Vec<u8>>;

    /// The stored text for `key`; empty when the key has no data.
    fn get_raw_text(&self, key: &Key) -> Result<String> {
        let bytes = self.get_raw_bytes(key)?;
        Ok(self.context().decode(&key.name(), &bytes))
    }

    fn set_raw_text(&self, key: &Key, _text: &str) -> Result<()> {
        Err(ModuleError::read_only(format!("set_raw_text({}) on {}", key, self.context().name())))
    }

    /// Makes `alias` share the stored data of `source`.
    fn set_alias_key(&self, alias: &Key, _source: &Key) -> Result<()> {
        Err(ModuleError::unsupported(format!(
            "set_alias_key({}) on {:?}",
            alias,
            self.context().config.driver
        )))
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn decipher(&self, data: &mut [u8]) {
        self.context().decipher(data);
    }

    fn encipher(&self, data: &mut [u8]) {
        self.context().encipher(data);
    }

    fn read_stats(&self) -> ReadStatsSnapshot {
        self.context().stats.snapshot()
    }
}

/// Builds the backend for a module's `ModDrv`.
///
/// The versification is used by verse-keyed drivers and ignored by the others.
pub fn open_backend(config: ModuleConfig, versification: Arc<dyn Versification>) -> Result<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match config.driver {
        BookType::RawText | BookType::RawText4 | BookType::RawCom | BookType::RawCom4 => {
            Box::new(RawBackend::new(config, versification)?)
        }
        BookType::ZText | BookType::ZCom => Box::new(ZVerseBackend::new(config, versification)?),
        BookType::RawFiles => Box::new(RawFileBackend::new(config, versification)?),
        BookType::RawLd | BookType::RawLd4 => Box::new(RawLDBackend::new(config)?),
        BookType::ZLd => Box::new(ZLDBackend::new(config)?),
        BookType::RawGenBook => Box::new(GenBookBackend::new(config)?),
    };
    Ok(backend)
}
