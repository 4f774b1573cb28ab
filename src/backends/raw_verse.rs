//! Uncompressed verse-keyed modules (`RawText`, `RawText4`, `RawCom`, `RawCom4`).
//!
//! Each testament has a data file (`ot`, `nt`) holding verse text back to back and an
//! index file (`ot.vss`, `nt.vss`) holding one `(offset, size)` record per verse
//! ordinal. The `4` drivers store the size in 4 bytes instead of 2.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::backends::{Backend, ModuleContext};
use crate::config::ModuleConfig;
use crate::keys::{Key, KeyList, Testament, VerseKey, Versification};
use crate::storage::{open_module_file, DataIndex, OpenState, SizeWidth};
use crate::utils::read_region;
use crate::{ModuleError, Result};

/// Open handles of one testament.
pub(crate) struct TestamentFiles {
    pub index: File,
    pub data: File,
}

/// Open handles of both testaments; a testament without files is `None`.
#[derive(Default)]
pub(crate) struct VerseFiles {
    pub ot: Option<TestamentFiles>,
    pub nt: Option<TestamentFiles>,
}

impl VerseFiles {
    pub fn get_mut(&mut self, testament: Testament) -> Option<&mut TestamentFiles> {
        match testament {
            Testament::Intro => None,
            Testament::Old => self.ot.as_mut(),
            Testament::New => self.nt.as_mut(),
        }
    }

    /// Opens `<prefix><index_suffix>` and `<prefix><data_suffix>` for each present testament.
    pub fn open(
        config: &ModuleConfig,
        present: &[Testament],
        index_suffix: &str,
        data_suffix: &str,
        writable: bool,
    ) -> Result<Self> {
        let mut files = VerseFiles::default();
        for testament in present {
            let Some(prefix) = testament.file_prefix() else { continue };
            let opened = TestamentFiles {
                index: open_module_file(&config.module_file(&format!("{}{}", prefix, index_suffix)), writable)?,
                data: open_module_file(&config.module_file(&format!("{}{}", prefix, data_suffix)), writable)?,
            };
            match testament {
                Testament::Old => files.ot = Some(opened),
                Testament::New => files.nt = Some(opened),
                Testament::Intro => {}
            }
        }
        Ok(files)
    }
}

/// Testaments whose index and data files both exist.
///
/// # Errors
///
/// Returns a `Configuration` error when neither testament is present.
pub(crate) fn present_testaments(config: &ModuleConfig, index_suffix: &str, data_suffix: &str) -> Result<Vec<Testament>> {
    let present: Vec<Testament> = [Testament::Old, Testament::New]
        .into_iter()
        .filter(|testament| {
            testament.file_prefix().is_some_and(|prefix| {
                config.module_file(&format!("{}{}", prefix, index_suffix)).is_file()
                    && config.module_file(&format!("{}{}", prefix, data_suffix)).is_file()
            })
        })
        .collect();
    if present.is_empty() {
        return Err(ModuleError::configuration(format!(
            "{}: no ot or nt data under {}",
            config.name,
            config.data_path.display()
        )));
    }
    Ok(present)
}

pub(crate) fn verse_key(key: &Key) -> Result<&VerseKey> {
    match key {
        Key::Verse(verse) => Ok(verse),
        other => Err(ModuleError::read_failure(other.name(), "a verse key is required")),
    }
}

/// Lists the verses of one testament whose index record has a positive size.
pub(crate) fn enumerate_verses(
    versification: &dyn Versification,
    testament: Testament,
    index: &mut File,
    record_len: usize,
    decode: impl Fn(&[u8], usize) -> Result<i64>,
) -> Result<Vec<VerseKey>> {
    let mut buf = Vec::new();
    index.seek(SeekFrom::Start(0))?;
    index.read_to_end(&mut buf)?;

    let mut keys = Vec::new();
    for ordinal in 0..buf.len() / record_len {
        if decode(&buf, ordinal * record_len)? <= 0 {
            continue;
        }
        match versification.verse_at(testament, ordinal as u32) {
            Some(key) => keys.push(key),
            None => warn!(
                "{:?} ordinal {} has data but no verse in the {} versification",
                testament,
                ordinal,
                versification.name()
            ),
        }
    }
    Ok(keys)
}

pub struct RawBackend {
    context: ModuleContext,
    versification: Arc<dyn Versification>,
    width: SizeWidth,
    present: Vec<Testament>,
    files: Mutex<OpenState<VerseFiles>>,
}

impl RawBackend {
    /// # Errors
    ///
    /// Returns a `Configuration` error when neither testament's files exist.
    pub fn new(config: ModuleConfig, versification: Arc<dyn Versification>) -> Result<Self> {
        let present = present_testaments(&config, ".vss", "")?;
        let width = config.driver.size_width();
        Ok(Self {
            context: ModuleContext::new(config),
            versification,
            width,
            present,
            files: Mutex::new(OpenState::Closed),
        })
    }

    fn open_files(&self) -> Result<VerseFiles> {
        VerseFiles::open(&self.context.config, &self.present, ".vss", "", false)
    }

    /// The index record for a verse; `None` when its testament has no files.
    fn lookup_index(&self, files: &mut VerseFiles, testament: Testament, ordinal: u32) -> Result<Option<DataIndex>> {
        let Some(testament_files) = files.get_mut(testament) else {
            return Ok(None);
        };
        self.context.stats.record_index_read();
        let index = DataIndex::read_record(&mut testament_files.index, ordinal as u64, self.width)?;
        Ok(Some(index))
    }

    fn read_verse(&self, verse: &VerseKey) -> Result<Vec<u8>> {
        let (testament, ordinal) = self.versification.locate(verse)?;
        let mut state = self.files.lock();
        let files = state.get_or_open(|| self.open_files())?;

        let index = match self.lookup_index(files, testament, ordinal)? {
            Some(index) if index.size != 0 => index,
            _ => return Ok(Vec::new()),
        };
        let Some(testament_files) = files.get_mut(testament) else {
            return Ok(Vec::new());
        };
        self.context.stats.record_data_read();
        let mut data = read_region(&mut testament_files.data, index.offset as u64, index.size as i64)?;
        self.context.decipher(&mut data);
        Ok(data)
    }
}

impl Backend for RawBackend {
    fn context(&self) -> &ModuleContext {
        &self.context
    }

    fn activate(&self) -> Result<()> {
        self.files.lock().get_or_open(|| self.open_files())?;
        Ok(())
    }

    fn deactivate(&self) {
        if self.files.lock().close() {
            debug!("Closed {}", self.context.name());
        }
    }

    fn is_active(&self) -> bool {
        self.files.lock().is_open()
    }

    fn read_index(&self) -> Result<KeyList> {
        let mut state = self.files.lock();
        let files = state.get_or_open(|| self.open_files())?;
        let width = self.width;
        let mut keys = Vec::new();
        for testament in [Testament::Old, Testament::New] {
            if let Some(testament_files) = files.get_mut(testament) {
                keys.extend(enumerate_verses(
                    self.versification.as_ref(),
                    testament,
                    &mut testament_files.index,
                    width.record_len(),
                    |buf, pos| Ok(DataIndex::decode(buf, pos, width)?.size as i64),
                )?);
            }
        }
        Ok(KeyList::Verses(keys))
    }

    fn contains(&self, key: &Key) -> bool {
        let result = verse_key(key).and_then(|verse| {
            let (testament, ordinal) = self.versification.locate(verse)?;
            let mut state = self.files.lock();
            let files = state.get_or_open(|| self.open_files())?;
            Ok(self.lookup_index(files, testament, ordinal)?.is_some_and(|index| index.size > 0))
        });
        result.unwrap_or_else(|e| {
            debug!("contains({}) failed: {}", key, e);
            false
        })
    }

    fn get_raw_bytes(&self, key: &Key) -> Result<Vec<u8>> {
        let verse = verse_key(key)?;
        self.read_verse(verse).map_err(|e| e.into_read_failure(key.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BookType;
    use crate::keys::OrdinalVersification;
    use std::path::Path;

    fn write_raw_module(dir: &Path, verses: &[&str], width: SizeWidth) {
        let mut data = Vec::new();
        let mut index = Vec::new();
        for verse in verses {
            let record = DataIndex::new(data.len() as u32, verse.len() as i32).encode(width).unwrap();
            index.extend(record);
            data.extend_from_slice(verse.as_bytes());
        }
        std::fs::write(dir.join("ot"), data).unwrap();
        std::fs::write(dir.join("ot.vss"), index).unwrap();
    }

    fn backend(dir: &Path, driver: BookType, count: u32) -> (RawBackend, Arc<OrdinalVersification>) {
        let v11n = Arc::new(OrdinalVersification::new("Test", count, 0));
        let config = ModuleConfig::new("Test", driver, dir);
        (RawBackend::new(config, v11n.clone()).unwrap(), v11n)
    }

    #[test]
    fn test_two_verse_module() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ot"), b"In the beginningAnd").unwrap();
        std::fs::write(dir.path().join("ot.vss"), [0, 0, 0, 0, 16, 0, 16, 0, 0, 0, 3, 0]).unwrap();
        let (raw, v11n) = backend(dir.path(), BookType::RawText, 2);

        assert_eq!(raw.get_raw_text(&Key::Verse(v11n.key(0))).unwrap(), "In the beginning");
        assert_eq!(raw.get_raw_text(&Key::Verse(v11n.key(1))).unwrap(), "And");
    }

    #[test]
    fn test_clamped_verse_then_empty_verse() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ot"), b"In the beginning").unwrap();
        std::fs::write(dir.path().join("ot.vss"), [0, 0, 0, 0, 17, 0, 16, 0, 0, 0, 0, 0]).unwrap();
        let (raw, v11n) = backend(dir.path(), BookType::RawText, 2);

        assert_eq!(raw.get_raw_text(&Key::Verse(v11n.key(0))).unwrap(), "In the beginning");
        assert_eq!(raw.get_raw_text(&Key::Verse(v11n.key(1))).unwrap(), "");
        assert!(raw.contains(&Key::Verse(v11n.key(0))));
        assert!(!raw.contains(&Key::Verse(v11n.key(1))));
    }

    #[test]
    fn test_wide_size_records() {
        let dir = tempfile::tempdir().unwrap();
        write_raw_module(dir.path(), &["alpha", "", "gamma"], SizeWidth::U32);
        let (raw, v11n) = backend(dir.path(), BookType::RawText4, 3);

        assert_eq!(raw.get_raw_text(&Key::Verse(v11n.key(2))).unwrap(), "gamma");
        assert!(raw.contains(&Key::Verse(v11n.key(0))));
        assert!(!raw.contains(&Key::Verse(v11n.key(1))));
    }

    #[test]
    fn test_zero_size_reads_no_data() {
        let dir = tempfile::tempdir().unwrap();
        write_raw_module(dir.path(), &["alpha", ""], SizeWidth::U16);
        let (raw, v11n) = backend(dir.path(), BookType::RawText, 2);

        let before = raw.read_stats();
        assert_eq!(raw.get_raw_text(&Key::Verse(v11n.key(1))).unwrap(), "");
        let after = raw.read_stats();
        assert_eq!(after.data_reads, before.data_reads);
        assert_eq!(after.index_reads, before.index_reads + 1);
    }

    #[test]
    fn test_missing_testament_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        write_raw_module(dir.path(), &["alpha"], SizeWidth::U16);
        let v11n = Arc::new(OrdinalVersification::new("Test", 1, 1));
        let raw = RawBackend::new(ModuleConfig::new("Test", BookType::RawText, dir.path()), v11n.clone()).unwrap();
        assert_eq!(raw.get_raw_text(&Key::Verse(v11n.key(1))).unwrap(), "");
    }

    #[test]
    fn test_no_testament_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let v11n = Arc::new(OrdinalVersification::new("Test", 1, 1));
        let err = RawBackend::new(ModuleConfig::new("Test", BookType::RawText, dir.path()), v11n).err().unwrap();
        assert!(matches!(err, ModuleError::Configuration { .. }));
    }

    #[test]
    fn test_overlong_region_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ot"), b"short").unwrap();
        std::fs::write(dir.path().join("ot.vss"), [1, 0, 0, 0, 50, 0]).unwrap();
        let (raw, v11n) = backend(dir.path(), BookType::RawText, 1);
        assert_eq!(raw.get_raw_text(&Key::Verse(v11n.key(0))).unwrap(), "hort");
    }

    #[test]
    fn test_lifecycle_and_read_index() {
        let dir = tempfile::tempdir().unwrap();
        write_raw_module(dir.path(), &["a", "", "c"], SizeWidth::U16);
        let (raw, v11n) = backend(dir.path(), BookType::RawText, 3);

        assert!(!raw.is_active());
        raw.activate().unwrap();
        raw.activate().unwrap();
        assert!(raw.is_active());
        raw.deactivate();
        raw.deactivate();
        assert!(!raw.is_active());
        assert_eq!(raw.get_raw_text(&Key::Verse(v11n.key(2))).unwrap(), "c");
        assert!(raw.is_active());

        match raw.read_index().unwrap() {
            KeyList::Verses(keys) => assert_eq!(keys, vec![v11n.key(0), v11n.key(2)]),
            other => panic!("unexpected key list: {:?}", other),
        }
    }

    #[test]
    fn test_writes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_raw_module(dir.path(), &["a"], SizeWidth::U16);
        let (raw, v11n) = backend(dir.path(), BookType::RawText, 1);
        let key = Key::Verse(v11n.key(0));
        assert!(!raw.is_writable());
        assert!(matches!(raw.set_raw_text(&key, "x").unwrap_err(), ModuleError::ReadOnly { .. }));
        assert!(matches!(raw.set_alias_key(&key, &key).unwrap_err(), ModuleError::Unsupported { .. }));
    }
}
