//! Block-compressed verse-keyed modules (`zText`, `zCom`).
//!
//! Verses are grouped into blocks (by book, chapter or verse, per `BlockType`) that
//! are compressed as a unit. Three files per testament, `X` being the block type
//! letter:
//!
//! | File     | Record                                                      |
//! |----------|-------------------------------------------------------------|
//! | `ot.Xzv` | 10 bytes per verse: block number, start in block, size (u16) |
//! | `ot.Xzs` | 12 bytes per block: offset, compressed size, uncompressed size |
//! | `ot.Xzz` | compressed (and possibly enciphered) blocks                  |
//!
//! The last decompressed block is kept, so reading a chapter verse by verse costs
//! one block read and one decompression.

use std::fs::File;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::backends::raw_verse::{enumerate_verses, present_testaments, verse_key, VerseFiles};
use crate::backends::{Backend, ModuleContext};
use crate::config::ModuleConfig;
use crate::keys::{Key, KeyList, Testament, VerseKey, Versification};
use crate::storage::{open_module_file, BlockCache, BlockKey, OpenState};
use crate::utils::{decode_le16, decode_le32, get_compressor, read_region, Compressor};
use crate::{ModuleError, Result};

const COMP_RECORD_LEN: usize = 10;
const BLOCK_RECORD_LEN: usize = 12;

/// Location of one verse inside a decompressed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VerseEntry {
    block: u32,
    start: u32,
    size: u16,
}

impl VerseEntry {
    fn decode(buf: &[u8], pos: usize) -> Result<Self> {
        Ok(Self {
            block: decode_le32(buf, pos)?,
            start: decode_le32(buf, pos + 4)?,
            size: decode_le16(buf, pos + 8)?,
        })
    }
}

struct ZVerseFiles {
    /// `index` is the verse (comp) file, `data` the compressed text.
    verses: VerseFiles,
    ot_blocks: Option<File>,
    nt_blocks: Option<File>,
}

impl ZVerseFiles {
    fn blocks_mut(&mut self, testament: Testament) -> Option<&mut File> {
        match testament {
            Testament::Intro => None,
            Testament::Old => self.ot_blocks.as_mut(),
            Testament::New => self.nt_blocks.as_mut(),
        }
    }
}

struct ZVerseState {
    files: OpenState<ZVerseFiles>,
    cache: BlockCache,
}

pub struct ZVerseBackend {
    context: ModuleContext,
    versification: Arc<dyn Versification>,
    compressor: Box<dyn Compressor>,
    present: Vec<Testament>,
    comp_suffix: String,
    block_suffix: String,
    text_suffix: String,
    state: Mutex<ZVerseState>,
}

impl ZVerseBackend {
    /// # Errors
    ///
    /// Returns a `Configuration` error when neither testament's files exist.
    pub fn new(config: ModuleConfig, versification: Arc<dyn Versification>) -> Result<Self> {
        let letter = config.block_type.indicator();
        let comp_suffix = format!(".{}zv", letter);
        let block_suffix = format!(".{}zs", letter);
        let text_suffix = format!(".{}zz", letter);

        let present: Vec<Testament> = present_testaments(&config, &comp_suffix, &text_suffix)?
            .into_iter()
            .filter(|testament| {
                testament
                    .file_prefix()
                    .is_some_and(|prefix| config.module_file(&format!("{}{}", prefix, block_suffix)).is_file())
            })
            .collect();
        if present.is_empty() {
            return Err(ModuleError::configuration(format!(
                "{}: block index files {} are missing",
                config.name, block_suffix
            )));
        }

        let compressor = get_compressor(config.compress_type);
        Ok(Self {
            context: ModuleContext::new(config),
            versification,
            compressor,
            present,
            comp_suffix,
            block_suffix,
            text_suffix,
            state: Mutex::new(ZVerseState { files: OpenState::Closed, cache: BlockCache::new() }),
        })
    }

    fn open_files(&self) -> Result<ZVerseFiles> {
        let config = &self.context.config;
        let verses = VerseFiles::open(config, &self.present, &self.comp_suffix, &self.text_suffix, false)?;
        let mut files = ZVerseFiles { verses, ot_blocks: None, nt_blocks: None };
        for testament in &self.present {
            let Some(prefix) = testament.file_prefix() else { continue };
            let blocks = open_module_file(&config.module_file(&format!("{}{}", prefix, self.block_suffix)), false)?;
            match testament {
                Testament::Old => files.ot_blocks = Some(blocks),
                Testament::New => files.nt_blocks = Some(blocks),
                Testament::Intro => {}
            }
        }
        Ok(files)
    }

    fn read_verse(&self, verse: &VerseKey) -> Result<Vec<u8>> {
        let (testament, ordinal) = self.versification.locate(verse)?;
        let mut guard = self.state.lock();
        let ZVerseState { files, cache } = &mut *guard;
        let files = files.get_or_open(|| self.open_files())?;

        let Some(testament_files) = files.verses.get_mut(testament) else {
            return Ok(Vec::new());
        };
        self.context.stats.record_index_read();
        let record = read_region(&mut testament_files.index, ordinal as u64 * COMP_RECORD_LEN as u64, COMP_RECORD_LEN as i64)?;
        if record.len() < COMP_RECORD_LEN {
            return Ok(Vec::new());
        }
        let entry = VerseEntry::decode(&record, 0)?;
        if entry.size == 0 {
            return Ok(Vec::new());
        }

        let block_key = BlockKey::verse(testament, entry.block);
        if cache.get(block_key).is_some() {
            debug!("Block {:?} served from cache", block_key);
        } else {
            let Some(bytes) = self.load_block(files, testament, entry.block)? else {
                return Ok(Vec::new());
            };
            cache.put(block_key, bytes);
        }
        let block = cache
            .get(block_key)
            .ok_or_else(|| ModuleError::invalid_data_format(format!("block {:?} was not cached", block_key)))?;

        let start = entry.start as usize;
        let mut end = start + entry.size as usize;
        if start >= block.len() {
            warn!("{}: {} starts at {} past its {} byte block", self.context.name(), verse, start, block.len());
            return Ok(Vec::new());
        }
        if end > block.len() {
            warn!("{}: {} runs past its block, clamping to {} bytes", self.context.name(), verse, block.len());
            end = block.len();
        }
        Ok(block[start..end].to_vec())
    }

    /// Reads, deciphers and decompresses one block. `None` when the block index
    /// has no record for it.
    fn load_block(&self, files: &mut ZVerseFiles, testament: Testament, block: u32) -> Result<Option<Vec<u8>>> {
        let blocks = files
            .blocks_mut(testament)
            .ok_or_else(|| ModuleError::invalid_data_format(format!("no block index for {:?}", testament)))?;
        let record = read_region(blocks, block as u64 * BLOCK_RECORD_LEN as u64, BLOCK_RECORD_LEN as i64)?;
        if record.len() < BLOCK_RECORD_LEN {
            warn!("{}: block {} is not in the {:?} block index", self.context.name(), block, testament);
            return Ok(None);
        }
        let offset = decode_le32(&record, 0)?;
        let size = decode_le32(&record, 4)?;
        let uncompressed_size = decode_le32(&record, 8)? as usize;

        let text = files
            .verses
            .get_mut(testament)
            .ok_or_else(|| ModuleError::invalid_data_format(format!("no text file for {:?}", testament)))?;
        self.context.stats.record_data_read();
        let mut compressed = read_region(&mut text.data, offset as u64, size as i64)?;
        self.context.decipher(&mut compressed);

        self.context.stats.record_decompression();
        let decompressed = self.compressor.decompress(&compressed, None)?;
        if decompressed.len() != uncompressed_size {
            warn!(
                "{}: block {} decompressed to {} bytes, index says {}",
                self.context.name(),
                block,
                decompressed.len(),
                uncompressed_size
            );
        }
        Ok(Some(decompressed))
    }
}

impl Backend for ZVerseBackend {
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
        let files = state.files.get_or_open(|| self.open_files())?;
        let mut keys = Vec::new();
        for testament in [Testament::Old, Testament::New] {
            if let Some(testament_files) = files.verses.get_mut(testament) {
                keys.extend(enumerate_verses(
                    self.versification.as_ref(),
                    testament,
                    &mut testament_files.index,
                    COMP_RECORD_LEN,
                    |buf, pos| Ok(decode_le16(buf, pos + 8)? as i64),
                )?);
            }
        }
        Ok(KeyList::Verses(keys))
    }

    fn contains(&self, key: &Key) -> bool {
        let result = verse_key(key).and_then(|verse| {
            let (testament, ordinal) = self.versification.locate(verse)?;
            let mut state = self.state.lock();
            let files = state.files.get_or_open(|| self.open_files())?;
            let Some(testament_files) = files.verses.get_mut(testament) else {
                return Ok(false);
            };
            let record = read_region(&mut testament_files.index, ordinal as u64 * COMP_RECORD_LEN as u64, COMP_RECORD_LEN as i64)?;
            Ok(record.len() == COMP_RECORD_LEN && decode_le16(&record, 8)? > 0)
        });
        result.unwrap_or(false)
    }

    fn get_raw_bytes(&self, key: &Key) -> Result<Vec<u8>> {
        let verse = verse_key(key)?;
        self.read_verse(verse).map_err(|e| e.into_read_failure(key.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlockType, BookType};
    use crate::keys::OrdinalVersification;
    use crate::utils::CompressionMethod;
    use std::path::Path;

    /// Writes `blocks` of verses for the Old Testament; verses are numbered in order.
    fn write_zverse(dir: &Path, blocks: &[&[&str]], method: CompressionMethod, cipher_key: Option<&str>) {
        let compressor = get_compressor(method);
        let cipher = cipher_key.map(crate::crypto::get_cipher);
        let (mut comp, mut block_index, mut text) = (Vec::new(), Vec::new(), Vec::new());
        for (block_no, verses) in blocks.iter().enumerate() {
            let mut plain = Vec::new();
            for verse in verses.iter() {
                comp.extend((block_no as u32).to_le_bytes());
                comp.extend((plain.len() as u32).to_le_bytes());
                comp.extend((verse.len() as u16).to_le_bytes());
                plain.extend_from_slice(verse.as_bytes());
            }
            let mut packed = compressor.compress(&plain).unwrap();
            if let Some(cipher) = &cipher {
                cipher.encipher(&mut packed);
            }
            block_index.extend((text.len() as u32).to_le_bytes());
            block_index.extend((packed.len() as u32).to_le_bytes());
            block_index.extend((plain.len() as u32).to_le_bytes());
            text.extend(packed);
        }
        std::fs::write(dir.join("ot.bzv"), comp).unwrap();
        std::fs::write(dir.join("ot.bzs"), block_index).unwrap();
        std::fs::write(dir.join("ot.bzz"), text).unwrap();
    }

    fn config(dir: &Path, method: CompressionMethod) -> ModuleConfig {
        ModuleConfig::new("Z", BookType::ZText, dir).with_compression(method, BlockType::Book)
    }

    #[test]
    fn test_reads_across_blocks() {
        let dir = tempfile::tempdir().unwrap();
        write_zverse(dir.path(), &[&["In the beginning", "And"], &["Third", ""]], CompressionMethod::Zip, None);
        let v11n = Arc::new(OrdinalVersification::new("T", 4, 0));
        let backend = ZVerseBackend::new(config(dir.path(), CompressionMethod::Zip), v11n.clone()).unwrap();

        assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(0))).unwrap(), "In the beginning");
        assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(1))).unwrap(), "And");
        assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(2))).unwrap(), "Third");
        assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(3))).unwrap(), "");
        assert!(!backend.contains(&Key::Verse(v11n.key(3))));
    }

    #[test]
    fn test_same_block_is_decompressed_once() {
        let dir = tempfile::tempdir().unwrap();
        write_zverse(dir.path(), &[&["a", "b", "c"], &["d"]], CompressionMethod::Bzip2, None);
        let v11n = Arc::new(OrdinalVersification::new("T", 4, 0));
        let backend = ZVerseBackend::new(config(dir.path(), CompressionMethod::Bzip2), v11n.clone()).unwrap();

        let first = backend.get_raw_text(&Key::Verse(v11n.key(0))).unwrap();
        let after_first = backend.read_stats();
        let second = backend.get_raw_text(&Key::Verse(v11n.key(0))).unwrap();
        let neighbour = backend.get_raw_text(&Key::Verse(v11n.key(2))).unwrap();
        let after_repeat = backend.read_stats();

        assert_eq!(first, second);
        assert_eq!(neighbour, "c");
        assert_eq!(after_first.decompressions, 1);
        assert_eq!(after_repeat.decompressions, 1);
        assert_eq!(after_repeat.data_reads, after_first.data_reads);

        backend.get_raw_text(&Key::Verse(v11n.key(3))).unwrap();
        backend.get_raw_text(&Key::Verse(v11n.key(0))).unwrap();
        assert_eq!(backend.read_stats().decompressions, 3);
    }

    #[test]
    fn test_deactivate_drops_cache() {
        let dir = tempfile::tempdir().unwrap();
        write_zverse(dir.path(), &[&["a", "b"]], CompressionMethod::Xz, None);
        let v11n = Arc::new(OrdinalVersification::new("T", 2, 0));
        let backend = ZVerseBackend::new(config(dir.path(), CompressionMethod::Xz), v11n.clone()).unwrap();

        assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(1))).unwrap(), "b");
        backend.deactivate();
        assert!(!backend.is_active());
        assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(1))).unwrap(), "b");
        assert_eq!(backend.read_stats().decompressions, 2);
    }

    #[test]
    fn test_enciphered_blocks() {
        let dir = tempfile::tempdir().unwrap();
        write_zverse(dir.path(), &[&["Locked text"]], CompressionMethod::Zip, Some("k3y"));
        let v11n = Arc::new(OrdinalVersification::new("T", 1, 0));
        let backend = ZVerseBackend::new(config(dir.path(), CompressionMethod::Zip).with_cipher_key("k3y"), v11n.clone()).unwrap();
        assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(0))).unwrap(), "Locked text");
    }

    #[test]
    fn test_missing_block_index_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        write_zverse(dir.path(), &[&["a"]], CompressionMethod::Zip, None);
        std::fs::remove_file(dir.path().join("ot.bzs")).unwrap();
        let v11n = Arc::new(OrdinalVersification::new("T", 1, 0));
        let err = ZVerseBackend::new(config(dir.path(), CompressionMethod::Zip), v11n).err().unwrap();
        assert!(matches!(err, ModuleError::Configuration { .. }));
    }

    #[test]
    fn test_block_past_block_index_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        write_zverse(dir.path(), &[&["abc"]], CompressionMethod::Zip, None);
        let mut comp = std::fs::read(dir.path().join("ot.bzv")).unwrap();
        comp.extend(7u32.to_le_bytes());
        comp.extend(0u32.to_le_bytes());
        comp.extend(3u16.to_le_bytes());
        std::fs::write(dir.path().join("ot.bzv"), comp).unwrap();
        let v11n = Arc::new(OrdinalVersification::new("T", 2, 0));
        let backend = ZVerseBackend::new(config(dir.path(), CompressionMethod::Zip), v11n.clone()).unwrap();

        assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(0))).unwrap(), "abc");
        assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(1))).unwrap(), "");
        assert_eq!(backend.read_stats().decompressions, 1);
        assert_eq!(backend.get_raw_text(&Key::Verse(v11n.key(0))).unwrap(), "abc");
        assert_eq!(backend.read_stats().decompressions, 1);
    }

    #[test]
    fn test_corrupt_block_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        write_zverse(dir.path(), &[&["a"]], CompressionMethod::Zip, None);
        std::fs::write(dir.path().join("ot.bzz"), b"not zlib at all").unwrap();
        std::fs::write(dir.path().join("ot.bzs"), [0, 0, 0, 0, 15, 0, 0, 0, 1, 0, 0, 0]).unwrap();
        let v11n = Arc::new(OrdinalVersification::new("T", 1, 0));
        let backend = ZVerseBackend::new(config(dir.path(), CompressionMethod::Zip), v11n.clone()).unwrap();
        let err = backend.get_raw_text(&Key::Verse(v11n.key(0))).unwrap_err();
        assert!(err.is_read_failure());
    }
}
