//! Typed module configuration.
//!
//! SWORD modules are described by a `.conf` descriptor. Parsing that text is left to
//! the caller; this module holds the typed properties the backends need, keyed by
//! the descriptor's own entry names so a parsed descriptor can be deserialized
//! straight into a [`ModuleConfig`].
//!
//! # Examples
//!
//! ```
//! use sword_module::config::{BookType, ModuleConfig};
//!
//! let config = ModuleConfig::from_json(r#"{
//!     "Name": "KJV",
//!     "ModDrv": "zText",
//!     "DataPath": "/usr/share/sword/modules/texts/ztext/kjv",
//!     "CompressType": "ZIP",
//!     "BlockType": "BOOK",
//!     "Encoding": "UTF-8"
//! }"#)?;
//! assert_eq!(config.driver, BookType::ZText);
//! # Ok::<(), sword_module::ModuleError>(())
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::SizeWidth;
use crate::utils::{Charset, CompressionMethod};
use crate::Result;

/// Storage driver named by `ModDrv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookType {
    RawText,
    RawText4,
    #[serde(rename = "zText")]
    ZText,
    RawCom,
    RawCom4,
    #[serde(rename = "zCom")]
    ZCom,
    RawFiles,
    #[serde(rename = "RawLD")]
    RawLd,
    #[serde(rename = "RawLD4")]
    RawLd4,
    #[serde(rename = "zLD")]
    ZLd,
    RawGenBook,
}

impl BookType {
    /// Width of the size field in the driver's primary index records.
    pub fn size_width(&self) -> SizeWidth {
        match self {
            BookType::RawText4 | BookType::RawCom4 | BookType::RawLd4 | BookType::ZLd => SizeWidth::U32,
            _ => SizeWidth::U16,
        }
    }

    pub fn default_category(&self) -> BookCategory {
        match self {
            BookType::RawText | BookType::RawText4 | BookType::ZText => BookCategory::Bible,
            BookType::RawCom | BookType::RawCom4 | BookType::ZCom | BookType::RawFiles => BookCategory::Commentary,
            BookType::RawLd | BookType::RawLd4 | BookType::ZLd => BookCategory::Dictionary,
            BookType::RawGenBook => BookCategory::GeneralBook,
        }
    }
}

/// Unit of text grouped into one compressed block (`BlockType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockType {
    Book,
    #[default]
    Chapter,
    Verse,
}

impl BlockType {
    /// Letter used in compressed verse file names (`ot.bzs`, `ot.czs`, `ot.vzs`).
    pub fn indicator(&self) -> char {
        match self {
            BlockType::Book => 'b',
            BlockType::Chapter => 'c',
            BlockType::Verse => 'v',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookCategory {
    #[serde(rename = "Biblical Texts")]
    Bible,
    #[serde(rename = "Commentaries")]
    Commentary,
    #[serde(rename = "Lexicons / Dictionaries")]
    Dictionary,
    #[serde(rename = "Glossaries")]
    Glossary,
    #[serde(rename = "Daily Devotional")]
    DailyDevotions,
    #[serde(rename = "Generic Books")]
    GeneralBook,
    #[serde(other)]
    Other,
}

/// `Feature` entries the backends act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feature {
    GreekDef,
    HebrewDef,
    DailyDevotion,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleConfig {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "ModDrv")]
    pub driver: BookType,
    /// Resolved data location: a directory for verse modules, a file stem for
    /// dictionaries and generic books.
    pub data_path: PathBuf,
    #[serde(default)]
    pub encoding: Charset,
    #[serde(default)]
    pub compress_type: CompressionMethod,
    #[serde(default)]
    pub block_type: BlockType,
    #[serde(default)]
    pub cipher_key: Option<String>,
    #[serde(default)]
    pub category: Option<BookCategory>,
    #[serde(default, rename = "Feature")]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub versification: Option<String>,
}

impl ModuleConfig {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, driver: BookType, data_path: P) -> Self {
        Self {
            name: name.into(),
            driver,
            data_path: data_path.into(),
            encoding: Charset::default(),
            compress_type: CompressionMethod::default(),
            block_type: BlockType::default(),
            cipher_key: None,
            category: None,
            features: Vec::new(),
            versification: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_encoding(mut self, encoding: Charset) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_compression(mut self, compress_type: CompressionMethod, block_type: BlockType) -> Self {
        self.compress_type = compress_type;
        self.block_type = block_type;
        self
    }

    pub fn with_cipher_key<S: Into<String>>(mut self, key: S) -> Self {
        self.cipher_key = Some(key.into());
        self
    }

    pub fn with_category(mut self, category: BookCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    pub fn category(&self) -> BookCategory {
        self.category.unwrap_or_else(|| self.driver.default_category())
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn is_daily_devotional(&self) -> bool {
        self.category() == BookCategory::DailyDevotions || self.has_feature(Feature::DailyDevotion)
    }

    /// The cipher key, when one is configured and non-empty.
    pub fn cipher_key(&self) -> Option<&str> {
        self.cipher_key.as_deref().filter(|key| !key.is_empty())
    }

    /// A file inside the module's data directory.
    pub fn module_file(&self, name: &str) -> PathBuf {
        self.data_path.join(name)
    }

    /// The data stem with an extension appended, e.g. `strongsgreek.idx`.
    pub fn stem_file(&self, extension: &str) -> PathBuf {
        let mut path = self.data_path.clone().into_os_string();
        path.push(".");
        path.push(extension);
        PathBuf::from(path)
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }
}
