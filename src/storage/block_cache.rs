//! Single-entry cache of the last decompressed block.
//!
//! Sequential reading touches the same block many times in a row, so remembering
//! one block is enough to avoid repeated reads and decompression. The cache is a
//! plain `Option`; with it removed every lookup still returns the same bytes.

use crate::keys::Testament;

/// Identifies a block. Dictionary blocks have no testament.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub testament: Option<Testament>,
    pub block: u32,
}

impl BlockKey {
    pub fn verse(testament: Testament, block: u32) -> Self {
        Self { testament: Some(testament), block }
    }

    pub fn dictionary(block: u32) -> Self {
        Self { testament: None, block }
    }
}

#[derive(Debug, Default)]
pub struct BlockCache {
    entry: Option<(BlockKey, Vec<u8>)>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: BlockKey) -> Option<&[u8]> {
        match &self.entry {
            Some((cached, bytes)) if *cached == key => Some(bytes),
            _ => None,
        }
    }

    /// Replaces the cached block and returns the stored bytes.
    pub fn put(&mut self, key: BlockKey, bytes: Vec<u8>) -> &[u8] {
        &self.entry.insert((key, bytes)).1
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_last_block_is_kept() {
        let mut cache = BlockCache::new();
        let first = BlockKey::verse(Testament::Old, 0);
        let second = BlockKey::verse(Testament::New, 0);
        cache.put(first, b"old".to_vec());
        assert_eq!(cache.get(first), Some(&b"old"[..]));
        assert_eq!(cache.get(second), None);

        cache.put(second, b"new".to_vec());
        assert_eq!(cache.get(first), None);
        assert_eq!(cache.get(second), Some(&b"new"[..]));
        assert_eq!(cache.get(BlockKey::dictionary(0)), None);

        cache.clear();
        assert_eq!(cache.get(second), None);
    }
}
