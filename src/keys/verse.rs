//! Verse keys and the versification adapter.
//!
//! Backends never interpret verse references. A [`Versification`] turns a
//! [`VerseKey`] into the testament it lives in and its ordinal within that
//! testament, which is the record number in the testament's index file.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ModuleError, Result};

/// Testament partition of a verse-addressed module.
///
/// `Intro` holds module-level introductions and never has stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Testament {
    Intro = 0,
    Old = 1,
    New = 2,
}

impl Testament {
    /// File name prefix of the testament's data and index files.
    pub fn file_prefix(&self) -> Option<&'static str> {
        match self {
            Testament::Intro => None,
            Testament::Old => Some("ot"),
            Testament::New => Some("nt"),
        }
    }
}

/// A verse reference together with its global ordinal in a versification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerseKey {
    pub name: String,
    pub ordinal: u32,
}

impl VerseKey {
    pub fn new<S: Into<String>>(name: S, ordinal: u32) -> Self {
        Self { name: name.into(), ordinal }
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Maps verse keys to `(testament, ordinal)` and back.
pub trait Versification: Send + Sync {
    fn name(&self) -> &str;

    fn locate(&self, key: &VerseKey) -> Result<(Testament, u32)>;

    /// Number of index records in the testament.
    fn verse_count(&self, testament: Testament) -> u32;

    fn verse_at(&self, testament: Testament, ordinal: u32) -> Option<VerseKey>;
}

/// Versification defined only by how many ordinals each testament holds.
///
/// Global ordinals `0..old` belong to the Old Testament, the next `new` ordinals
/// to the New Testament. Verse names can be supplied; otherwise the global
/// ordinal is used as the name.
#[derive(Debug, Clone)]
pub struct OrdinalVersification {
    name: String,
    old: u32,
    new: u32,
    names: Vec<String>,
}

impl OrdinalVersification {
    pub fn new<S: Into<String>>(name: S, old: u32, new: u32) -> Self {
        Self { name: name.into(), old, new, names: Vec::new() }
    }

    /// Names verses by global ordinal, starting at ordinal 0.
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the key for a global ordinal.
    pub fn key(&self, ordinal: u32) -> VerseKey {
        let name = self
            .names
            .get(ordinal as usize)
            .cloned()
            .unwrap_or_else(|| ordinal.to_string());
        VerseKey::new(name, ordinal)
    }

    /// Builds the key for a verse name given to [`with_names`](Self::with_names).
    pub fn key_by_name(&self, name: &str) -> Option<VerseKey> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| VerseKey::new(name, i as u32))
    }
}

impl Versification for OrdinalVersification {
    fn name(&self) -> &str {
        &self.name
    }

    fn locate(&self, key: &VerseKey) -> Result<(Testament, u32)> {
        if key.ordinal < self.old {
            Ok((Testament::Old, key.ordinal))
        } else if key.ordinal - self.old < self.new {
            Ok((Testament::New, key.ordinal - self.old))
        } else {
            Err(ModuleError::invalid_parameter(format!(
                "{} (ordinal {}) is outside the {} versification",
                key.name, key.ordinal, self.name
            )))
        }
    }

    fn verse_count(&self, testament: Testament) -> u32 {
        match testament {
            Testament::Intro => 0,
            Testament::Old => self.old,
            Testament::New => self.new,
        }
    }

    fn verse_at(&self, testament: Testament, ordinal: u32) -> Option<VerseKey> {
        match testament {
            Testament::Old if ordinal < self.old => Some(self.key(ordinal)),
            Testament::New if ordinal < self.new => Some(self.key(self.old + ordinal)),
            _ => None,
        }
    }
}
