// Keys addressing module entries
//
// A verse key is resolved through a versification, a dictionary key carries the
// data index it was read with, and a tree key is linked to its ancestors.

pub mod tree;
pub mod verse;

use std::fmt;
use std::sync::Arc;

use crate::storage::DataIndex;

pub use tree::{TreeKey, TreeKeyNode};
pub use verse::{OrdinalVersification, Testament, VerseKey, Versification};

/// A dictionary headword and where its record lives in the `.dat` file.
///
/// `name` is the display form; `internal_name` is the headword as stored, which
/// differs for daily devotionals (`MM.DD` stored, date displayed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub name: String,
    pub internal_name: String,
    pub index: DataIndex,
}

/// Any key a backend can be asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Verse(VerseKey),
    Index(IndexKey),
    Tree(Arc<TreeKey>),
}

impl Key {
    pub fn name(&self) -> String {
        match self {
            Key::Verse(key) => key.name.clone(),
            Key::Index(key) => key.name.clone(),
            Key::Tree(key) => key.to_string(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<VerseKey> for Key {
    fn from(key: VerseKey) -> Self {
        Key::Verse(key)
    }
}

impl From<IndexKey> for Key {
    fn from(key: IndexKey) -> Self {
        Key::Index(key)
    }
}

impl From<Arc<TreeKey>> for Key {
    fn from(key: Arc<TreeKey>) -> Self {
        Key::Tree(key)
    }
}

/// The whole key space of a module, as produced by `read_index`.
#[derive(Debug, Clone)]
pub enum KeyList {
    Verses(Vec<VerseKey>),
    /// Sorted by display name, case-sensitively.
    Entries(Vec<IndexKey>),
    Tree(TreeKeyNode),
}

impl KeyList {
    pub fn len(&self) -> usize {
        match self {
            KeyList::Verses(keys) => keys.len(),
            KeyList::Entries(keys) => keys.len(),
            KeyList::Tree(root) => root.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<Key> {
        match self {
            KeyList::Verses(keys) => keys.iter().cloned().map(Key::Verse).collect(),
            KeyList::Entries(keys) => keys.iter().cloned().map(Key::Index).collect(),
            KeyList::Tree(root) => root.flatten().into_iter().map(Key::Tree).collect(),
        }
    }
}
