//! Block-compressed dictionaries (`zLD`).
//!
//! | File          | Record                                                    |
//! |---------------|-----------------------------------------------------------|
//! | `module.idx`  | 8 bytes per entry: offset and size in `module.dat`        |
//! | `module.dat`  | `headword\n` + block number (u32) + entry in block (u32)  |
//! | `module.zdx`  | 8 bytes per block: offset and size in `module.zdt`        |
//! | `module.zdt`  | compressed (and possibly enciphered) blocks               |
//!
//! A decompressed block starts with its entry count followed by one
//! `(offset, size)` pair per entry, offsets counted from the start of the block.
//! A `.dat` body of `@LINK target` replaces the block reference.

use std::fs::File;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::backends::dictionary::{DatRecord, DictionaryIndex, EntryBody};
use crate::backends::{Backend, ModuleContext};
use crate::config::ModuleConfig;
use crate::keys::{IndexKey, Key, KeyList};
use crate::storage::{open_module_file, BlockCache, BlockKey, OpenState, SizeWidth};
use crate::utils::{decode_le32, get_compressor, read_region, Compressor};
use crate::{ModuleError, Result};

const BLOCK_RECORD_LEN: usize = 8;
const ENTRY_RECORD_LEN: usize = 8;

/// Where a headword's text sits: block number and entry within the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockEntry {
    block: u32,
    entry: u32,
}

struct ZLdFiles {
    idx: File,
    dat: File,
    zdx: File,
    zdt: File,
}

struct ZLdState {
    files: OpenState<ZLdFiles>,
    index: Option<Arc<DictionaryIndex>>,
    cache: BlockCache,
}

pub struct ZLDBackend {
    context: ModuleContext,
    compressor: Box<dyn Compressor>,
    state: Mutex<ZLdState>,
}

impl ZLDBackend {
    /// # Errors
    ///
    /// Returns a `Configuration` error when any of the four module files is missing.
    pub fn new(config: ModuleConfig) -> Result<Self> {
        for extension in ["idx", "dat", "zdx", "zdt"] {
            let path = config.stem_file(extension);
            if !path.is_file() {
                return Err(ModuleError::configuration(format!("{}: {} not found", config.name, path.display())));
            }
        }
        let compressor = get_compressor(config.compress_type);
        Ok(Self {
            context: ModuleContext::new(config),
            compressor,
            state: Mutex::new(ZLdState { files: OpenState::Closed, index: None, cache: BlockCache::new() }),
        })
    }

    fn open_files(&self) -> Result<ZLdFiles> {
        let config = &self.context.config;
        Ok(ZLdFiles {
            idx: open_module_file(&config.stem_file("idx"), false)?,
            dat: open_module_file(&config.stem_file("dat"), false)?,
            zdx: open_module_file(&config.stem_file("zdx"), false)?,
            zdt: open_module_file(&config.stem_file("zdt"), false)?,
        })
    }

    fn dictionary(&self, state: &mut ZLdState) -> Result<Arc<DictionaryIndex>> {
        if let Some(index) = &state.index {
            return Ok(Arc::clone(index));
        }
        let files = state.files.get_or_open(|| self.open_files())?;
        let index = Arc::new(DictionaryIndex::build(&self.context, &mut files.idx, &mut files.dat, SizeWidth::U32)?);
        state.index = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Finds the key for `text`, normalizing case, Strong's numbers and dates.
    pub fn find_key(&self, text: &str) -> Result<Option<IndexKey>> {
        let mut state = self.state.lock();
        Ok(self.dictionary(&mut state)?.find(text).cloned())
    }

    fn read_entry(&self, start: &IndexKey) -> Result<Vec<u8>> {
        let mut guard = self.state.lock();
        let index = self.dictionary(&mut guard)?;
        let ZLdState { files, cache, .. } = &mut *guard;
        let files = files.get_or_open(|| self.open_files())?;

        let location = index.follow_links(start, |key| {
            self.context.stats.record_data_read();
            let record = read_region(&mut files.dat, key.index.offset as u64, key.index.size as i64)?;
            let record = DatRecord::split(record)
                .ok_or_else(|| ModuleError::read_failure(&key.name, "entry has no headword separator"))?;
            if let Some(target) = record.link_target(&self.context) {
                return Ok(EntryBody::Link(target));
            }
            Ok(EntryBody::Content(BlockEntry {
                block: decode_le32(&record.body, 0)?,
                entry: decode_le32(&record.body, 4)?,
            }))
        })?;

        let block_key = BlockKey::dictionary(location.block);
        if cache.get(block_key).is_some() {
            debug!("Block {} served from cache", location.block);
        } else {
            let bytes = self.load_block(files, location.block)?;
            cache.put(block_key, bytes);
        }
        let block = cache
            .get(block_key)
            .ok_or_else(|| ModuleError::invalid_data_format(format!("block {} was not cached", location.block)))?;
        self.entry_text(block, location)
    }

    fn load_block(&self, files: &mut ZLdFiles, block: u32) -> Result<Vec<u8>> {
        let record = read_region(&mut files.zdx, block as u64 * BLOCK_RECORD_LEN as u64, BLOCK_RECORD_LEN as i64)?;
        if record.len() < BLOCK_RECORD_LEN {
            return Err(ModuleError::invalid_data_format(format!("block {} is not in the block index", block)));
        }
        let offset = decode_le32(&record, 0)?;
        let size = decode_le32(&record, 4)?;

        self.context.stats.record_data_read();
        let mut compressed = read_region(&mut files.zdt, offset as u64, size as i64)?;
        self.context.decipher(&mut compressed);
        self.context.stats.record_decompression();
        self.compressor.decompress(&compressed, None)
    }

    /// Cuts one entry out of a decompressed block, dropping trailing NULs.
    fn entry_text(&self, block: &[u8], location: BlockEntry) -> Result<Vec<u8>> {
        let count = decode_le32(block, 0)?;
        if location.entry >= count {
            warn!(
                "{}: entry {} requested from block {} holding {} entries",
                self.context.name(),
                location.entry,
                location.block,
                count
            );
            return Ok(Vec::new());
        }
        let pos = 4 + location.entry as usize * ENTRY_RECORD_LEN;
        let start = decode_le32(block, pos)? as usize;
        let size = decode_le32(block, pos + 4)? as usize;
        if start >= block.len() {
            warn!("{}: entry {} starts past its block", self.context.name(), location.entry);
            return Ok(Vec::new());
        }
        let end = (start + size).min(block.len());
        let mut text = block[start..end].to_vec();
        while text.last() == Some(&0) {
            text.pop();
        }
        Ok(text)
    }
}

impl Backend for ZLDBackend {
    fn context(&self) -> &ModuleContext {
        &self.context
    }

    fn activate(&self) -> Result<()> {
        self.state.lock().files.get_or_open(|| self.open_files())?;
        Ok(())
    }

    fn deactivate(&self) {
        let mut state = self.state.lock();
        state.files.close();
        state.cache.clear();
    }

    fn is_active(&self) -> bool {
        self.state.lock().files.is_open()
    }

    fn read_index(&self) -> Result<KeyList> {
        let mut state = self.state.lock();
        Ok(KeyList::Entries(self.dictionary(&mut state)?.entries()))
    }

    fn contains(&self, key: &Key) -> bool {
        let Key::Index(key) = key else { return false };
        let mut state = self.state.lock();
        self.dictionary(&mut state)
            .map(|index| index.get(&key.name).is_some_and(|found| !found.index.is_empty()))
            .unwrap_or(false)
    }

    fn get_raw_bytes(&self, key: &Key) -> Result<Vec<u8>> {
        let Key::Index(entry) = key else {
            return Err(ModuleError::read_failure(key.name(), "not a dictionary key"));
        };
        if entry.index.is_empty() {
            return Ok(Vec::new());
        }
        self.read_entry(entry).map_err(|e| e.into_read_failure(key.name()))
    }

    /// Entry text with surrounding whitespace and NULs trimmed.
    fn get_raw_text(&self, key: &Key) -> Result<String> {
        let bytes = self.get_raw_bytes(key)?;
        let text = self.context.decode(&key.name(), &bytes);
        Ok(text.trim_matches(|c: char| c.is_whitespace() || c == '\0').to_string())
    }
}
